pub mod club;
pub mod contact;
pub mod group;
pub mod health;
