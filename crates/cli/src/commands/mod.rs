pub mod doctor;
pub mod onboard;
pub mod prompt;
pub mod run;
