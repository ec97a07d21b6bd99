//! Saved address commands.

use palengke_core::AddressId;
use palengke_storefront::Storefront;
use palengke_storefront::error::Result;

pub async fn list(storefront: &Storefront) -> Result<()> {
    let addresses = storefront.addresses().list().await?;
    if addresses.is_empty() {
        tracing::info!("No saved addresses");
    }

    for address in addresses {
        let place = [
            address.barangay_name.as_deref(),
            address.city_name.as_deref(),
            address.province_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");

        tracing::info!(
            "{:>4}{} {}, {}  ({})  pinned: {}",
            address.address_id,
            if address.is_default { "*" } else { " " },
            address.additional_info,
            place,
            address.phone_number,
            address.latitude.is_some() && address.longitude.is_some()
        );
    }
    Ok(())
}

pub async fn set_default(storefront: &Storefront, address: AddressId) -> Result<()> {
    storefront.addresses().set_default(address).await?;
    tracing::info!(%address, "Default address updated");
    Ok(())
}

pub async fn delete(storefront: &Storefront, address: AddressId) -> Result<()> {
    storefront.addresses().delete(address).await?;
    tracing::info!(%address, "Address deleted");
    Ok(())
}
