//! Location cascade and address form through the HTTP client.

#![allow(clippy::unwrap_used)]

use palengke_core::{AddressId, BarangayId, CityId, ProvinceId};
use palengke_integration_tests::StubServer;
use palengke_storefront::addresses::AddressFields;
use palengke_storefront::location::Level;
use palengke_storefront::{StoreError, Storefront};

#[tokio::test]
async fn test_cascade_reads_wrapped_and_bare_lists() {
    let server = StubServer::start().await;
    let storefront = Storefront::connect(&server.config()).unwrap();
    let cascade = storefront.location_cascade();

    // provinces are wrapped, cities bare, barangays under "data"
    cascade.load_provinces().await.unwrap();
    assert_eq!(cascade.provinces().len(), 2);

    cascade.select_province(ProvinceId::new(1)).await.unwrap();
    let names: Vec<String> = cascade.cities().into_iter().map(|c| c.name).collect();
    assert_eq!(names, ["Cebu City", "Lapu-Lapu", "Mandaue"]);

    cascade.select_city(CityId::new(11)).await.unwrap();
    assert_eq!(cascade.barangays().len(), 3);
    assert!(!cascade.is_loading(Level::Barangay));
}

#[tokio::test]
async fn test_province_change_clears_lower_levels() {
    let server = StubServer::start().await;
    let storefront = Storefront::connect(&server.config()).unwrap();
    let cascade = storefront.location_cascade();

    cascade.load_provinces().await.unwrap();
    cascade.select_province(ProvinceId::new(1)).await.unwrap();
    cascade.select_city(CityId::new(11)).await.unwrap();
    cascade.select_barangay(BarangayId::new(110)).unwrap();
    cascade.set_coordinates(10.31, 123.95).unwrap();
    assert!(cascade.is_submittable());

    cascade.select_province(ProvinceId::new(2)).await.unwrap();

    let draft = cascade.draft();
    assert_eq!(draft.province_id, Some(ProvinceId::new(2)));
    assert!(draft.city_id.is_none());
    assert!(draft.barangay_id.is_none());
    assert!(draft.coordinates.is_none());
    assert!(cascade.barangays().is_empty());
    assert_eq!(cascade.cities().len(), 2);
}

#[tokio::test]
async fn test_location_lists_are_cached_per_client() {
    let server = StubServer::start().await;
    let storefront = Storefront::connect(&server.config()).unwrap();

    storefront.location_cascade().load_provinces().await.unwrap();
    storefront.location_cascade().load_provinces().await.unwrap();

    assert_eq!(server.backend.call_count("list_provinces"), 1);
}

#[tokio::test]
async fn test_address_form_creates_then_edits() {
    let server = StubServer::start().await;
    let storefront = Storefront::connect(&server.config()).unwrap();
    let form = storefront.address_form();

    form.start_new().await.unwrap();
    let cascade = form.cascade();
    cascade.select_province(ProvinceId::new(2)).await.unwrap();
    cascade.select_city(CityId::new(20)).await.unwrap();
    cascade.select_barangay(BarangayId::new(200)).unwrap();

    let fields = AddressFields {
        street_info: "5 Maginhawa St".to_string(),
        phone: "0917-765-4321".to_string(),
        is_default: false,
    };
    let err = form.submit(&fields).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(server.backend.call_count("create_address"), 0);

    cascade.set_coordinates(14.65, 121.07).unwrap();
    let created = form.submit(&fields).await.unwrap();
    assert_eq!(created.phone_number, "09177654321");
    assert_eq!(form.editing(), Some(created.address_id));

    let editor = storefront.address_form();
    let loaded = editor.edit(AddressId::new(1)).await.unwrap();
    assert_eq!(editor.cascade().draft().barangay_id, Some(BarangayId::new(110)));
    assert_eq!(editor.cascade().barangays().len(), 3);

    let updated = editor
        .submit(&AddressFields {
            street_info: "14 M.L. Quezon Hwy".to_string(),
            ..loaded
        })
        .await
        .unwrap();
    assert_eq!(updated.address_id, AddressId::new(1));
    assert_eq!(updated.additional_info, "14 M.L. Quezon Hwy");

    let saved = storefront.addresses().list().await.unwrap();
    assert_eq!(saved.len(), 2);
}
