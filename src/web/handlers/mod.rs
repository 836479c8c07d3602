//! # Web API Request Handlers
//!
//! One module per resource. Handlers validate input, call the model and
//! service layers and shape responses; SQL lives in [`crate::models`].

pub mod admin;
pub mod auth;
pub mod books;
pub mod categories;
pub mod health;
pub mod library;
pub mod payments;
pub mod purchases;
pub mod reading;
pub mod storage;
pub mod wishlist;

use serde::{Deserialize, Deserializer};

/// Deserialize a field that distinguishes "absent" from "null".
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: a missing key stays `None`, an explicit `null`
/// becomes `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
