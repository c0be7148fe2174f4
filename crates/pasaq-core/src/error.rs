use thiserror::Error;

use crate::game::GameError;
use crate::model::ModelError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PasaqError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Model(#[from] ModelError),
}
