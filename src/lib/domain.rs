//! Domain layer: recipients, templates, delivery and campaign bookkeeping

pub mod campaigns;
pub mod communication;
pub mod configuration;
pub mod recipients;
