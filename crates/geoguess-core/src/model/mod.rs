pub mod answer;
pub mod attribute;
pub mod category;
pub mod item;
pub mod question;
