pub mod colors;
pub mod history;
pub mod lasso;
pub mod tools;
