//! Province → city → barangay cascade.
//!
//! # Transition table
//!
//! | Selected   | Clears                              | Fetches          |
//! |------------|-------------------------------------|------------------|
//! | province   | city, barangay, coordinates         | cities           |
//! | city       | barangay, coordinates               | barangays        |
//! | barangay   | coordinates                         | -                |
//!
//! Clearing a level also empties its option list. Each option list carries a
//! generation counter that is bumped whenever the list is invalidated; a
//! fetch only writes its result if the generation it started with is still
//! current, so the last-selected parent always wins.

use std::sync::{Arc, PoisonError, RwLock};

use palengke_core::{BarangayId, CityId, ProvinceId};
use tracing::{debug, instrument};

use crate::api::{Address, ApiError, Barangay, City, LocationApi, Province};
use crate::error::{Result, StoreError};

// =============================================================================
// Selection Types
// =============================================================================

/// A level of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Province,
    City,
    Barangay,
}

impl Level {
    /// Level whose options depend on this one.
    #[must_use]
    pub const fn child(self) -> Option<Self> {
        match self {
            Self::Province => Some(Self::City),
            Self::City => Some(Self::Barangay),
            Self::Barangay => None,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Province => "provinces",
            Self::City => "cities",
            Self::Barangay => "barangays",
        }
    }
}

/// A pinned delivery point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Validate and build a coordinate pair.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if either value is not finite or out
    /// of range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(StoreError::validation(format!(
                "Latitude must be between -90 and 90, got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(StoreError::validation(format!(
                "Longitude must be between -180 and 180, got {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// The current (possibly partial) location selection.
///
/// Field presence always follows the cascade: a city implies a province, a
/// barangay implies a city, and coordinates imply a barangay.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocationSelection {
    pub province_id: Option<ProvinceId>,
    pub city_id: Option<CityId>,
    pub barangay_id: Option<BarangayId>,
    pub coordinates: Option<Coordinates>,
}

impl LocationSelection {
    /// All three levels and the pin are set.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.province_id.is_some()
            && self.city_id.is_some()
            && self.barangay_id.is_some()
            && self.coordinates.is_some()
    }

    /// Apply the transition table for a change at `level`.
    fn clear_below(&mut self, level: Level) {
        self.coordinates = None;
        match level {
            Level::Province => {
                self.city_id = None;
                self.barangay_id = None;
            }
            Level::City => self.barangay_id = None,
            Level::Barangay => {}
        }
    }
}

// =============================================================================
// Option Lists
// =============================================================================

#[derive(Debug)]
struct OptionList<T> {
    items: Vec<T>,
    generation: u64,
    loading: bool,
}

impl<T> Default for OptionList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            generation: 0,
            loading: false,
        }
    }
}

impl<T> OptionList<T> {
    /// Drop the current options and supersede any fetch in flight.
    fn invalidate(&mut self) {
        self.generation += 1;
        self.items.clear();
        self.loading = false;
    }

    /// Start a fetch, returning its generation token.
    fn begin(&mut self) -> u64 {
        self.invalidate();
        self.loading = true;
        self.generation
    }

    /// Store a fetch result if it is still current.
    ///
    /// A superseded result is discarded, including errors: the caller's
    /// selection no longer depends on it.
    fn resolve(
        &mut self,
        generation: u64,
        level: Level,
        result: std::result::Result<Vec<T>, ApiError>,
    ) -> Result<()> {
        if generation != self.generation {
            debug!(
                level = level.as_str(),
                generation,
                current = self.generation,
                "Discarding superseded option list"
            );
            return Ok(());
        }

        self.loading = false;
        match result {
            Ok(items) => {
                self.items = items;
                Ok(())
            }
            Err(e) => {
                self.items.clear();
                Err(StoreError::remote(
                    &e,
                    &format!("Failed to load {}", level.as_str()),
                ))
            }
        }
    }
}

#[derive(Debug, Default)]
struct CascadeState {
    selection: LocationSelection,
    provinces: OptionList<Province>,
    cities: OptionList<City>,
    barangays: OptionList<Barangay>,
}

impl CascadeState {
    /// Invalidate the option lists below `level`.
    fn invalidate_below(&mut self, level: Level) {
        let mut next = level.child();
        while let Some(child) = next {
            match child {
                Level::Province => self.provinces.invalidate(),
                Level::City => self.cities.invalidate(),
                Level::Barangay => self.barangays.invalidate(),
            }
            next = child.child();
        }
    }
}

// =============================================================================
// LocationCascade
// =============================================================================

/// Three-level dependent location selector.
pub struct LocationCascade {
    api: Arc<dyn LocationApi>,
    state: RwLock<CascadeState>,
}

impl LocationCascade {
    /// Create an empty cascade.
    #[must_use]
    pub fn new(api: Arc<dyn LocationApi>) -> Self {
        Self {
            api,
            state: RwLock::new(CascadeState::default()),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&CascadeState) -> R) -> R {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<R>(&self, f: impl FnOnce(&mut CascadeState) -> R) -> R {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Load the root province list.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the list cannot be fetched.
    #[instrument(skip(self))]
    pub async fn load_provinces(&self) -> Result<()> {
        let generation = self.write(|s| s.provinces.begin());
        let result = self.api.list_provinces().await;
        self.write(|s| s.provinces.resolve(generation, Level::Province, result))
    }

    /// Select a province, resetting everything below it and loading its cities.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the city list cannot be fetched. The
    /// selection itself is kept.
    #[instrument(skip(self))]
    pub async fn select_province(&self, province_id: ProvinceId) -> Result<()> {
        let generation = self.write(|s| {
            s.selection.province_id = Some(province_id);
            s.selection.clear_below(Level::Province);
            s.invalidate_below(Level::Province);
            s.cities.begin()
        });

        let result = self.api.list_cities(province_id).await;
        self.write(|s| s.cities.resolve(generation, Level::City, result))
    }

    /// Select a city, resetting the barangay and pin and loading barangays.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidState` if no province is selected, or
    /// `StoreError::Remote` if the barangay list cannot be fetched.
    #[instrument(skip(self))]
    pub async fn select_city(&self, city_id: CityId) -> Result<()> {
        let generation = self.write(|s| {
            if s.selection.province_id.is_none() {
                return Err(StoreError::invalid_state("select_city", "a selected province"));
            }
            s.selection.city_id = Some(city_id);
            s.selection.clear_below(Level::City);
            s.invalidate_below(Level::City);
            Ok(s.barangays.begin())
        })?;

        let result = self.api.list_barangays(city_id).await;
        self.write(|s| s.barangays.resolve(generation, Level::Barangay, result))
    }

    /// Select a barangay. The pin is cleared; the delivery point must be
    /// re-pinned inside the new barangay.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidState` if no city is selected.
    pub fn select_barangay(&self, barangay_id: BarangayId) -> Result<()> {
        self.write(|s| {
            if s.selection.city_id.is_none() {
                return Err(StoreError::invalid_state("select_barangay", "a selected city"));
            }
            s.selection.barangay_id = Some(barangay_id);
            s.selection.clear_below(Level::Barangay);
            Ok(())
        })
    }

    /// Pin the delivery point.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` for out-of-range values, or
    /// `StoreError::InvalidState` if no barangay is selected.
    pub fn set_coordinates(&self, latitude: f64, longitude: f64) -> Result<()> {
        let coordinates = Coordinates::new(latitude, longitude)?;
        self.write(|s| {
            if s.selection.barangay_id.is_none() {
                return Err(StoreError::invalid_state(
                    "set_coordinates",
                    "a selected barangay",
                ));
            }
            s.selection.coordinates = Some(coordinates);
            Ok(())
        })
    }

    /// Populate the cascade from a saved address (edit mode).
    ///
    /// The whole selection is set at once without the reset rules, then the
    /// city and barangay lists for it are loaded concurrently.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if either list cannot be fetched.
    #[instrument(skip(self, address), fields(address_id = %address.address_id))]
    pub async fn restore(&self, address: &Address) -> Result<()> {
        let coordinates = address
            .latitude
            .zip(address.longitude)
            .map(|(latitude, longitude)| Coordinates {
                latitude,
                longitude,
            });

        let (city_generation, barangay_generation) = self.write(|s| {
            s.selection = LocationSelection {
                province_id: Some(address.province_id),
                city_id: Some(address.city_id),
                barangay_id: Some(address.barangay_id),
                coordinates,
            };
            (s.cities.begin(), s.barangays.begin())
        });

        let (cities, barangays) = tokio::join!(
            self.api.list_cities(address.province_id),
            self.api.list_barangays(address.city_id)
        );

        self.write(|s| {
            let cities = s.cities.resolve(city_generation, Level::City, cities);
            let barangays = s
                .barangays
                .resolve(barangay_generation, Level::Barangay, barangays);
            cities.and(barangays)
        })
    }

    /// Clear the selection and the dependent option lists.
    ///
    /// The province list is kept.
    pub fn reset(&self) {
        self.write(|s| {
            s.selection = LocationSelection::default();
            s.invalidate_below(Level::Province);
        });
    }

    /// The current selection, for building an address payload.
    #[must_use]
    pub fn draft(&self) -> LocationSelection {
        self.read(|s| s.selection)
    }

    /// Whether province, city, barangay, and both coordinates are set.
    #[must_use]
    pub fn is_submittable(&self) -> bool {
        self.read(|s| s.selection.is_complete())
    }

    #[must_use]
    pub fn provinces(&self) -> Vec<Province> {
        self.read(|s| s.provinces.items.clone())
    }

    #[must_use]
    pub fn cities(&self) -> Vec<City> {
        self.read(|s| s.cities.items.clone())
    }

    #[must_use]
    pub fn barangays(&self) -> Vec<Barangay> {
        self.read(|s| s.barangays.items.clone())
    }

    /// Whether the option list for `level` is being fetched.
    #[must_use]
    pub fn is_loading(&self, level: Level) -> bool {
        self.read(|s| match level {
            Level::Province => s.provinces.loading,
            Level::City => s.cities.loading,
            Level::Barangay => s.barangays.loading,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::AddressApi;
    use crate::testing::FakeBackend;

    const CEBU: ProvinceId = ProvinceId::new(1);
    const MANILA: ProvinceId = ProvinceId::new(2);
    const CEBU_CITY: CityId = CityId::new(10);
    const LAPU_LAPU: CityId = CityId::new(11);
    const PAJO: BarangayId = BarangayId::new(110);

    fn cascade() -> (Arc<FakeBackend>, LocationCascade) {
        let backend = Arc::new(FakeBackend::seeded());
        let cascade = LocationCascade::new(backend.clone());
        (backend, cascade)
    }

    fn names<I>(options: &[crate::api::LocationOption<I>]) -> Vec<&str> {
        options.iter().map(|o| o.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_full_selection_then_reselect_province() {
        let (_, cascade) = cascade();

        cascade.select_province(CEBU).await.unwrap();
        assert!(names(&cascade.cities()).contains(&"Lapu-Lapu"));

        cascade.select_city(LAPU_LAPU).await.unwrap();
        assert!(names(&cascade.barangays()).contains(&"Pajo"));

        cascade.select_barangay(PAJO).unwrap();
        cascade.set_coordinates(10.31, 123.95).unwrap();
        assert!(cascade.is_submittable());

        cascade.select_province(MANILA).await.unwrap();
        let draft = cascade.draft();
        assert_eq!(draft.province_id, Some(MANILA));
        assert_eq!(draft.city_id, None);
        assert_eq!(draft.barangay_id, None);
        assert_eq!(draft.coordinates, None);
        assert!(!cascade.is_submittable());
        assert!(cascade.barangays().is_empty());
        assert_eq!(names(&cascade.cities()), vec!["Quezon City", "Makati"]);
    }

    #[tokio::test]
    async fn test_select_city_clears_barangay_and_pin() {
        let (_, cascade) = cascade();
        cascade.select_province(CEBU).await.unwrap();
        cascade.select_city(LAPU_LAPU).await.unwrap();
        cascade.select_barangay(PAJO).unwrap();
        cascade.set_coordinates(10.31, 123.95).unwrap();

        cascade.select_city(CEBU_CITY).await.unwrap();
        let draft = cascade.draft();
        assert_eq!(draft.province_id, Some(CEBU));
        assert_eq!(draft.city_id, Some(CEBU_CITY));
        assert_eq!(draft.barangay_id, None);
        assert_eq!(draft.coordinates, None);
        assert_eq!(names(&cascade.barangays()), vec!["Lahug", "Mabolo"]);
    }

    #[tokio::test]
    async fn test_select_barangay_clears_pin() {
        let (_, cascade) = cascade();
        cascade.select_province(CEBU).await.unwrap();
        cascade.select_city(LAPU_LAPU).await.unwrap();
        cascade.select_barangay(PAJO).unwrap();
        cascade.set_coordinates(10.31, 123.95).unwrap();

        cascade.select_barangay(BarangayId::new(111)).unwrap();
        assert_eq!(cascade.draft().coordinates, None);
        assert!(!cascade.is_submittable());
    }

    #[tokio::test]
    async fn test_out_of_order_selection_is_rejected() {
        let (backend, cascade) = cascade();

        let err = cascade.select_city(LAPU_LAPU).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidState { operation: "select_city", .. }));
        assert_eq!(backend.call_count("list_barangays"), 0);

        let err = cascade.select_barangay(PAJO).unwrap_err();
        assert!(matches!(err, StoreError::InvalidState { .. }));

        let err = cascade.set_coordinates(10.31, 123.95).unwrap_err();
        assert!(matches!(err, StoreError::InvalidState { .. }));
        assert_eq!(cascade.draft(), LocationSelection::default());
    }

    #[tokio::test]
    async fn test_coordinates_out_of_range() {
        let (_, cascade) = cascade();
        cascade.select_province(CEBU).await.unwrap();
        cascade.select_city(LAPU_LAPU).await.unwrap();
        cascade.select_barangay(PAJO).unwrap();

        assert!(matches!(
            cascade.set_coordinates(91.0, 123.95),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            cascade.set_coordinates(10.31, f64::NAN),
            Err(StoreError::Validation(_))
        ));
        assert!(!cascade.is_submittable());
    }

    #[test]
    fn test_submittable_requires_every_field() {
        let full = LocationSelection {
            province_id: Some(CEBU),
            city_id: Some(LAPU_LAPU),
            barangay_id: Some(PAJO),
            coordinates: Some(Coordinates::new(10.31, 123.95).unwrap()),
        };
        assert!(full.is_complete());

        for level in [Level::Province, Level::City, Level::Barangay] {
            let mut partial = full;
            partial.clear_below(level);
            assert!(!partial.is_complete(), "clearing below {level:?}");
        }
        assert!(
            !LocationSelection {
                province_id: None,
                ..full
            }
            .is_complete()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_city_fetch_is_discarded() {
        let (backend, cascade) = cascade();
        backend.delay_cities(CEBU, Duration::from_millis(500));
        let cascade = Arc::new(cascade);

        let slow = {
            let cascade = cascade.clone();
            tokio::spawn(async move { cascade.select_province(CEBU).await })
        };
        tokio::task::yield_now().await;
        assert!(cascade.is_loading(Level::City));

        cascade.select_province(MANILA).await.unwrap();
        slow.await.unwrap().unwrap();

        assert_eq!(cascade.draft().province_id, Some(MANILA));
        assert_eq!(names(&cascade.cities()), vec!["Quezon City", "Makati"]);
        assert!(!cascade.is_loading(Level::City));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_barangay_fetch_is_discarded() {
        let (backend, cascade) = cascade();
        cascade.select_province(CEBU).await.unwrap();
        backend.delay_barangays(LAPU_LAPU, Duration::from_millis(500));
        let cascade = Arc::new(cascade);

        let slow = {
            let cascade = cascade.clone();
            tokio::spawn(async move { cascade.select_city(LAPU_LAPU).await })
        };
        tokio::task::yield_now().await;

        cascade.select_city(CEBU_CITY).await.unwrap();
        slow.await.unwrap().unwrap();

        assert_eq!(cascade.draft().city_id, Some(CEBU_CITY));
        assert_eq!(names(&cascade.barangays()), vec!["Lahug", "Mabolo"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_list_empty() {
        let (backend, cascade) = cascade();
        backend.fail_next("list_cities", "Location service unavailable");

        let err = cascade.select_province(CEBU).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Remote("Location service unavailable".to_string())
        );
        assert!(cascade.cities().is_empty());
        assert!(!cascade.is_loading(Level::City));
        assert_eq!(cascade.draft().province_id, Some(CEBU));
    }

    #[tokio::test]
    async fn test_restore_from_address() {
        let backend = Arc::new(FakeBackend::seeded());
        let cascade = LocationCascade::new(backend.clone());
        let address = backend.get_address(palengke_core::AddressId::new(1)).await.unwrap();

        cascade.restore(&address).await.unwrap();

        assert!(cascade.is_submittable());
        assert_eq!(cascade.draft().barangay_id, Some(PAJO));
        assert!(names(&cascade.cities()).contains(&"Lapu-Lapu"));
        assert!(names(&cascade.barangays()).contains(&"Pajo"));
    }

    #[tokio::test]
    async fn test_load_provinces_and_reset() {
        let (_, cascade) = cascade();
        cascade.load_provinces().await.unwrap();
        assert_eq!(names(&cascade.provinces()), vec!["Cebu", "Manila"]);

        cascade.select_province(CEBU).await.unwrap();
        cascade.reset();
        assert_eq!(cascade.draft(), LocationSelection::default());
        assert!(cascade.cities().is_empty());
        assert_eq!(cascade.provinces().len(), 2);
    }
}
