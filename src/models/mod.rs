pub mod propertymodel;
pub mod uploadmodel;
pub mod usermodel;
