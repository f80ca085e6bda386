// Inventory management
pub mod hosts;

// Spec inspection
pub mod specs;

// Provisioning runs
pub mod configure;
