//! Checkout enums shared between the storefront core and the CLI.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a checkout enum from its wire/CLI name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// Rider delivery to the checkout address; fee depends on the pinned location.
    Delivery,
    /// Customer collects the order at a store. Requires a store ID.
    Pickup,
}

impl DeliveryMethod {
    /// Whether this method needs a pickup store.
    #[must_use]
    pub const fn requires_store(&self) -> bool {
        matches!(self, Self::Pickup)
    }

    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Delivery => "delivery",
            Self::Pickup => "pickup",
        }
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery" => Ok(Self::Delivery),
            "pickup" => Ok(Self::Pickup),
            _ => Err(ParseEnumError {
                kind: "delivery method",
                value: s.to_owned(),
            }),
        }
    }
}

/// How the customer pays for the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery (or on pickup). Settled synchronously.
    Cod,
    /// Hosted online payment. The backend returns a redirect target and the
    /// payment is confirmed out-of-band.
    Online,
}

impl PaymentMethod {
    /// Whether placing an order with this method yields a payment redirect.
    #[must_use]
    pub const fn is_asynchronous(&self) -> bool {
        matches!(self, Self::Online)
    }

    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cod => "cod",
            Self::Online => "online",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(Self::Cod),
            "online" => Ok(Self::Online),
            _ => Err(ParseEnumError {
                kind: "payment method",
                value: s.to_owned(),
            }),
        }
    }
}

/// Checkout pipeline step.
///
/// Steps only move forward, but an earlier step's setter may be re-invoked
/// to correct a choice, which drops the session back to that step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    #[default]
    Empty,
    AddressSet,
    ShippingSet,
    Placed,
    Confirmed,
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::AddressSet => write!(f, "address_set"),
            Self::ShippingSet => write!(f, "shipping_set"),
            Self::Placed => write!(f, "placed"),
            Self::Confirmed => write!(f, "confirmed"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_method_round_trips_through_str() {
        for method in [DeliveryMethod::Delivery, DeliveryMethod::Pickup] {
            assert_eq!(method.as_str().parse::<DeliveryMethod>().unwrap(), method);
        }
        assert!("drone".parse::<DeliveryMethod>().is_err());
    }

    #[test]
    fn test_only_pickup_requires_store() {
        assert!(DeliveryMethod::Pickup.requires_store());
        assert!(!DeliveryMethod::Delivery.requires_store());
    }

    #[test]
    fn test_payment_method_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentMethod::Cod).unwrap(), "\"cod\"");
        assert!(PaymentMethod::Online.is_asynchronous());
        assert!(!PaymentMethod::Cod.is_asynchronous());
        let err = "card".parse::<PaymentMethod>().unwrap_err();
        assert_eq!(err.to_string(), "invalid payment method: card");
    }

    #[test]
    fn test_checkout_steps_are_ordered() {
        assert!(CheckoutStep::Empty < CheckoutStep::AddressSet);
        assert!(CheckoutStep::AddressSet < CheckoutStep::ShippingSet);
        assert!(CheckoutStep::ShippingSet < CheckoutStep::Placed);
        assert!(CheckoutStep::Placed < CheckoutStep::Confirmed);
        assert_eq!(CheckoutStep::default(), CheckoutStep::Empty);
    }
}
