//! Location listing commands.
//!
//! Uses a `LocationCascade` so the listings follow the same selection rules
//! as the address form.

use palengke_core::{CityId, ProvinceId};
use palengke_storefront::Storefront;
use palengke_storefront::api::LocationOption;
use palengke_storefront::error::Result;

fn print<I: std::fmt::Display>(options: &[LocationOption<I>]) {
    if options.is_empty() {
        tracing::info!("No options");
    }
    for option in options {
        tracing::info!("{:>6}  {}", option.id, option.name);
    }
}

pub async fn provinces(storefront: &Storefront) -> Result<()> {
    let cascade = storefront.location_cascade();
    cascade.load_provinces().await?;
    print(&cascade.provinces());
    Ok(())
}

pub async fn cities(storefront: &Storefront, province: ProvinceId) -> Result<()> {
    let cascade = storefront.location_cascade();
    cascade.select_province(province).await?;
    print(&cascade.cities());
    Ok(())
}

/// Barangays need a province in the cascade; the city list is scanned for it.
pub async fn barangays(storefront: &Storefront, city: CityId) -> Result<()> {
    let cascade = storefront.location_cascade();
    cascade.load_provinces().await?;

    for province in cascade.provinces() {
        cascade.select_province(province.id).await?;
        if cascade.cities().iter().any(|c| c.id == city) {
            cascade.select_city(city).await?;
            print(&cascade.barangays());
            return Ok(());
        }
    }

    tracing::warn!(%city, "City not found in any province");
    Ok(())
}
