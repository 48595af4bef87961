//! Domain models for the LINO back-office

mod adjustment;
mod alert;
mod product;
mod purchase;
mod raw_material;
mod recipe;
mod sale;
mod settings;
mod user;

pub use adjustment::*;
pub use alert::*;
pub use product::*;
pub use purchase::*;
pub use raw_material::*;
pub use recipe::*;
pub use sale::*;
pub use settings::*;
pub use user::*;
