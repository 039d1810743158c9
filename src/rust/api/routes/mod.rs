pub mod diseases;
pub mod health;
pub mod prediction;
pub mod whatsapp;
