pub mod invoke;
pub mod lambda;
pub mod validate;

pub use invoke::InvokeCommand;
pub use lambda::LambdaCommand;
pub use validate::ValidateCommand;
