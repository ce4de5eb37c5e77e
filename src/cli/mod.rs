pub mod descriptor;
pub mod generate;
pub mod price;
pub mod ui;
