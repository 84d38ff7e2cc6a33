//! Status enums for orders, payments and deliveries.
//!
//! All enums serialize as lowercase strings, which is also how they are
//! stored in the database.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a string does not name a known status variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Error returned when an order status change is not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move order from {from} to {to}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Lowercase wire/database representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseStatusError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Order lifecycle status.
///
/// ```text
/// new -> confirmed -> preparing -> ready -> delivering -> completed
///   \________\___________\__________\__________\-------> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    New,
    Confirmed,
    Preparing,
    Ready,
    Delivering,
    Completed,
    Cancelled,
}

string_enum!(OrderStatus, "order status", {
    New => "new",
    Confirmed => "confirmed",
    Preparing => "preparing",
    Ready => "ready",
    Delivering => "delivering",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// The single forward step from this status, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::New => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Preparing),
            Self::Preparing => Some(Self::Ready),
            Self::Ready => Some(Self::Delivering),
            Self::Delivering => Some(Self::Completed),
            Self::Completed | Self::Cancelled => None,
        }
    }

    /// Whether moving to `to` is a legal transition.
    ///
    /// Forward moves advance exactly one step; `cancelled` is reachable from
    /// any non-terminal status.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Cancelled || self.next() == Some(to)
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the move is not in the transition table.
    pub fn transition_to(self, to: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError { from: self, to })
        }
    }

    /// Human-readable label used for tracking events.
    #[must_use]
    pub const fn tracking_label(self) -> &'static str {
        match self {
            Self::New => "Order received",
            Self::Confirmed => "Order confirmed",
            Self::Preparing => "Preparing your order",
            Self::Ready => "Ready",
            Self::Delivering => "Out for delivery",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Settlement status reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Success => "success",
    Failed => "failed",
});

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    ApplePay,
    GooglePay,
    Cash,
}

string_enum!(PaymentMethod, "payment method", {
    Card => "card",
    ApplePay => "applepay",
    GooglePay => "googlepay",
    Cash => "cash",
});

/// Fulfilment mode of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    Pickup,
    Delivery,
}

string_enum!(DeliveryType, "delivery type", {
    Pickup => "pickup",
    Delivery => "delivery",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 7] = [
        OrderStatus::New,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Delivering,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn test_linear_forward_path() {
        let mut status = OrderStatus::New;
        let mut visited = vec![status];
        while let Some(next) = status.next() {
            status = status.transition_to(next).unwrap();
            visited.push(status);
        }
        assert_eq!(visited.len(), 6);
        assert_eq!(status, OrderStatus::Completed);
    }

    #[test]
    fn test_no_skipping() {
        assert!(!OrderStatus::New.can_transition_to(OrderStatus::Ready));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Preparing));
    }

    #[test]
    fn test_cancel_from_any_non_terminal() {
        for status in ALL {
            assert_eq!(
                status.can_transition_to(OrderStatus::Cancelled),
                !status.is_terminal(),
                "{status}"
            );
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for to in ALL {
            assert!(!OrderStatus::Completed.can_transition_to(to));
            assert!(!OrderStatus::Cancelled.can_transition_to(to));
        }
    }

    #[test]
    fn test_transition_error_message() {
        let err = OrderStatus::Completed
            .transition_to(OrderStatus::New)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot move order from completed to new");
    }

    #[test]
    fn test_string_forms_match_serde() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&PaymentMethod::ApplePay).unwrap(),
            "\"applepay\""
        );
        assert_eq!("googlepay".parse(), Ok(PaymentMethod::GooglePay));
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }
}
