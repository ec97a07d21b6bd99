//! Cache types for location option lists.

use palengke_core::{CityId, ProvinceId};

use super::types::{Barangay, City, Province};

/// Cache key for location lists, scoped by parent ID.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Provinces,
    Cities(ProvinceId),
    Barangays(CityId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Provinces(Vec<Province>),
    Cities(Vec<City>),
    Barangays(Vec<Barangay>),
}
