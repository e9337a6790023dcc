//! Form state owned by the controller.

use serde::{Deserialize, Serialize};

/// The two free-text fields describing the pet. Never cleared automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetDescription {
    pub pet_type: String,
    pub characteristics: String,
}

impl PetDescription {
    #[must_use]
    pub fn new(pet_type: impl Into<String>, characteristics: impl Into<String>) -> Self {
        Self { pet_type: pet_type.into(), characteristics: characteristics.into() }
    }
}
