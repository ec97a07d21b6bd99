//! Saved addresses and the address submission form.
//!
//! [`AddressBook`] passes address management through to the backend.
//! [`AddressForm`] combines a [`LocationCascade`] with the free-text fields,
//! validates the draft locally, and creates or updates the address.

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use palengke_core::AddressId;
use regex::Regex;
use tracing::{info, instrument};

use crate::api::{Address, AddressApi, AddressInput, LocationApi};
use crate::error::{Result, StoreError, report};
use crate::location::LocationCascade;

/// Philippine mobile number, local (`09...`) or international (`+639...`).
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+63|0)9\d{9}$").expect("Invalid regex"));

const PIN_REQUIRED: &str =
    "Please pin your location on the map for accurate delivery fee calculation";

// =============================================================================
// AddressBook
// =============================================================================

/// The customer's saved addresses.
pub struct AddressBook {
    api: Arc<dyn AddressApi>,
}

impl AddressBook {
    #[must_use]
    pub fn new(api: Arc<dyn AddressApi>) -> Self {
        Self { api }
    }

    /// All saved addresses.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the list cannot be fetched.
    pub async fn list(&self) -> Result<Vec<Address>> {
        self.api
            .list_addresses()
            .await
            .map_err(|e| StoreError::remote(&e, "Failed to load addresses"))
    }

    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the address cannot be fetched.
    pub async fn get(&self, address_id: AddressId) -> Result<Address> {
        self.api
            .get_address(address_id)
            .await
            .map_err(|e| StoreError::remote(&e, "Failed to load address"))
    }

    /// The address marked as default, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the list cannot be fetched.
    pub async fn default_address(&self) -> Result<Option<Address>> {
        Ok(self.list().await?.into_iter().find(|a| a.is_default))
    }

    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the backend rejects the deletion.
    #[instrument(skip(self))]
    pub async fn delete(&self, address_id: AddressId) -> Result<()> {
        self.api
            .delete_address(address_id)
            .await
            .map_err(|e| StoreError::remote(&e, "Failed to delete address"))
    }

    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the backend rejects the change.
    #[instrument(skip(self))]
    pub async fn set_default(&self, address_id: AddressId) -> Result<()> {
        self.api
            .set_default_address(address_id)
            .await
            .map_err(|e| StoreError::remote(&e, "Failed to set default address"))
    }
}

// =============================================================================
// AddressForm
// =============================================================================

/// Free-text fields of an address draft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressFields {
    /// House number, street, building.
    pub street_info: String,
    pub phone: String,
    pub is_default: bool,
}

impl AddressFields {
    /// Fields of a saved address, for editing.
    #[must_use]
    pub fn from_address(address: &Address) -> Self {
        Self {
            street_info: address.additional_info.clone(),
            phone: address.phone_number.clone(),
            is_default: address.is_default,
        }
    }
}

/// Normalize a phone number for validation and submission.
fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Create-or-edit form for a delivery address.
pub struct AddressForm {
    api: Arc<dyn AddressApi>,
    cascade: LocationCascade,
    editing: RwLock<Option<AddressId>>,
}

impl AddressForm {
    #[must_use]
    pub fn new(api: Arc<dyn AddressApi>, locations: Arc<dyn LocationApi>) -> Self {
        Self {
            api,
            cascade: LocationCascade::new(locations),
            editing: RwLock::new(None),
        }
    }

    /// The location selector backing this form.
    #[must_use]
    pub const fn cascade(&self) -> &LocationCascade {
        &self.cascade
    }

    /// The address being edited, if not creating a new one.
    #[must_use]
    pub fn editing(&self) -> Option<AddressId> {
        *self.editing.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_editing(&self, address_id: Option<AddressId>) {
        *self
            .editing
            .write()
            .unwrap_or_else(PoisonError::into_inner) = address_id;
    }

    /// Start a new address: clear the selection and load provinces.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the province list cannot be fetched.
    pub async fn start_new(&self) -> Result<()> {
        self.set_editing(None);
        self.cascade.reset();
        self.cascade.load_provinces().await
    }

    /// Load a saved address into the form.
    ///
    /// Returns its free-text fields for the caller to display.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the address or its option lists cannot
    /// be fetched.
    #[instrument(skip(self))]
    pub async fn edit(&self, address_id: AddressId) -> Result<AddressFields> {
        let address = self
            .api
            .get_address(address_id)
            .await
            .map_err(|e| StoreError::remote(&e, "Failed to load address"))?;

        self.set_editing(Some(address_id));
        let (provinces, restored) =
            tokio::join!(self.cascade.load_provinces(), self.cascade.restore(&address));
        provinces.and(restored)?;

        Ok(AddressFields::from_address(&address))
    }

    /// Validate the draft without submitting it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` naming the first problem found.
    pub fn validate(&self, fields: &AddressFields) -> Result<AddressInput> {
        let draft = self.cascade.draft();

        let Some(coordinates) = draft.coordinates else {
            return Err(StoreError::validation(PIN_REQUIRED));
        };
        let (Some(province_id), Some(city_id), Some(barangay_id)) =
            (draft.province_id, draft.city_id, draft.barangay_id)
        else {
            return Err(StoreError::validation(
                "Please select a province, city, and barangay",
            ));
        };

        let street_info = fields.street_info.trim();
        if street_info.is_empty() {
            return Err(StoreError::validation("Please enter your street address"));
        }

        let phone = normalize_phone(&fields.phone);
        if !PHONE_RE.is_match(&phone) {
            return Err(StoreError::validation(
                "Please enter a valid mobile number (e.g. 09171234567)",
            ));
        }

        Ok(AddressInput {
            additional_info: street_info.to_string(),
            province_id,
            city_id,
            barangay_id,
            phone_number: phone,
            is_default: fields.is_default,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        })
    }

    /// Validate and save the address.
    ///
    /// Creates a new address, or updates the one loaded with
    /// [`edit`](Self::edit).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` before any remote call if the draft is
    /// incomplete, or `StoreError::Remote` if the backend rejects it.
    #[instrument(skip(self, fields))]
    pub async fn submit(&self, fields: &AddressFields) -> Result<Address> {
        let input = self.validate(fields)?;

        let result = match self.editing() {
            Some(address_id) => self.api.update_address(address_id, &input).await,
            None => self.api.create_address(&input).await,
        };
        let address = result.map_err(|e| {
            let err = StoreError::remote(&e, "Failed to save address");
            report(&err);
            err
        })?;

        info!(address_id = %address.address_id, "Address saved");
        self.set_editing(Some(address.address_id));
        Ok(address)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use palengke_core::{BarangayId, CityId, ProvinceId};

    use super::*;
    use crate::testing::FakeBackend;

    fn form() -> (Arc<FakeBackend>, AddressForm) {
        let backend = Arc::new(FakeBackend::seeded());
        let form = AddressForm::new(backend.clone(), backend.clone());
        (backend, form)
    }

    fn fields() -> AddressFields {
        AddressFields {
            street_info: "  Blk 4 Lot 2, Sampaguita St ".to_string(),
            phone: "0917-123 4567".to_string(),
            is_default: false,
        }
    }

    async fn pin_pajo(form: &AddressForm) {
        let cascade = form.cascade();
        cascade.select_province(ProvinceId::new(1)).await.unwrap();
        cascade.select_city(CityId::new(11)).await.unwrap();
        cascade.select_barangay(BarangayId::new(110)).unwrap();
        cascade.set_coordinates(10.31, 123.95).unwrap();
    }

    #[test]
    fn test_phone_pattern() {
        for valid in ["09171234567", "+639171234567"] {
            assert!(PHONE_RE.is_match(valid), "{valid}");
        }
        for invalid in ["9171234567", "0917123456", "08171234567", "+6309171234567"] {
            assert!(!PHONE_RE.is_match(invalid), "{invalid}");
        }
        assert_eq!(normalize_phone("0917-123 4567"), "09171234567");
    }

    #[tokio::test]
    async fn test_missing_pin_is_rejected_first() {
        let (backend, form) = form();
        let cascade = form.cascade();
        cascade.select_province(ProvinceId::new(1)).await.unwrap();
        cascade.select_city(CityId::new(11)).await.unwrap();
        cascade.select_barangay(BarangayId::new(110)).unwrap();
        backend.clear_calls();

        let err = form.submit(&AddressFields::default()).await.unwrap_err();
        assert_eq!(err, StoreError::Validation(PIN_REQUIRED.to_string()));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_field_validation() {
        let (_, form) = form();
        pin_pajo(&form).await;

        let mut bad = fields();
        bad.street_info = "   ".to_string();
        assert!(matches!(form.validate(&bad), Err(StoreError::Validation(_))));

        let mut bad = fields();
        bad.phone = "12345".to_string();
        assert!(matches!(form.validate(&bad), Err(StoreError::Validation(_))));

        let input = form.validate(&fields()).unwrap();
        assert_eq!(input.additional_info, "Blk 4 Lot 2, Sampaguita St");
        assert_eq!(input.phone_number, "09171234567");
        assert_eq!(input.barangay_id, BarangayId::new(110));
        assert!((input.latitude - 10.31).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_submit_creates_then_updates() {
        let (backend, form) = form();
        pin_pajo(&form).await;

        let created = form.submit(&fields()).await.unwrap();
        assert_eq!(created.address_id, AddressId::new(2));
        assert_eq!(form.editing(), Some(created.address_id));

        let mut changed = fields();
        changed.is_default = true;
        let updated = form.submit(&changed).await.unwrap();
        assert_eq!(updated.address_id, created.address_id);
        assert!(updated.is_default);
        assert_eq!(backend.call_count("create_address"), 1);
        assert_eq!(backend.call_count("update_address"), 1);
    }

    #[tokio::test]
    async fn test_edit_restores_cascade() {
        let (_, form) = form();

        let loaded = form.edit(AddressId::new(1)).await.unwrap();
        assert_eq!(loaded.street_info, "12 M.L. Quezon Hwy");
        assert!(form.cascade().is_submittable());
        assert_eq!(form.cascade().provinces().len(), 2);
        assert_eq!(form.editing(), Some(AddressId::new(1)));

        form.start_new().await.unwrap();
        assert_eq!(form.editing(), None);
        assert!(!form.cascade().is_submittable());
    }

    #[tokio::test]
    async fn test_remote_failure_uses_server_detail() {
        let (backend, form) = form();
        pin_pajo(&form).await;
        backend.fail_next("create_address", "Barangay outside delivery area");

        let err = form.submit(&fields()).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Remote("Barangay outside delivery area".to_string())
        );
        assert_eq!(form.editing(), None);
    }

    #[tokio::test]
    async fn test_address_book() {
        let backend = Arc::new(FakeBackend::seeded());
        let book = AddressBook::new(backend.clone());
        let form = AddressForm::new(backend.clone(), backend.clone());
        pin_pajo(&form).await;
        let second = form.submit(&fields()).await.unwrap();

        assert_eq!(book.list().await.unwrap().len(), 2);
        assert_eq!(
            book.default_address().await.unwrap().unwrap().address_id,
            AddressId::new(1)
        );

        book.set_default(second.address_id).await.unwrap();
        assert_eq!(
            book.default_address().await.unwrap().unwrap().address_id,
            second.address_id
        );

        book.delete(AddressId::new(1)).await.unwrap();
        let err = book.get(AddressId::new(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "Address not found");
    }
}
