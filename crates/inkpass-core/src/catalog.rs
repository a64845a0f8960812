//! Purchasable packages.
//!
//! The catalog maps a provider-side package id to what the buyer receives. Payment
//! callbacks only carry the package id, so settlement always resolves the grant here.

use serde::Serialize;

use crate::error::{EntitlementError, Result};
use crate::transaction::TransactionKind;

/// Coins charged to unlock a chapter when the caller does not name a price.
pub const DEFAULT_CHAPTER_UNLOCK_COST: i64 = 10;

/// A coin bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinPackage {
    /// Package id used by the payment provider.
    pub id: &'static str,
    /// Base coins.
    pub coins: i64,
    /// Bonus coins on top of the base amount.
    pub bonus_coins: i64,
    /// Price in IDR.
    pub price_minor_units: i64,
    /// Display label.
    pub label: &'static str,
    /// Highlighted in the storefront.
    pub popular: bool,
}

impl CoinPackage {
    /// Coins credited on a successful purchase, bonus included.
    #[must_use]
    pub const fn total_coins(&self) -> i64 {
        self.coins + self.bonus_coins
    }
}

/// A premium subscription window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PremiumPackage {
    /// Package id used by the payment provider.
    pub id: &'static str,
    /// Duration in calendar months.
    pub months: u32,
    /// Price in IDR.
    pub price_minor_units: i64,
    /// Display label.
    pub label: &'static str,
    /// Highlighted in the storefront.
    pub popular: bool,
    /// Advertised discount against the monthly price, in percent.
    pub discount_percent: u8,
}

/// Coin bundles on sale.
pub const COIN_PACKAGES: [CoinPackage; 4] = [
    CoinPackage {
        id: "coins_100",
        coins: 100,
        bonus_coins: 0,
        price_minor_units: 10_000,
        label: "100 Coins",
        popular: false,
    },
    CoinPackage {
        id: "coins_500",
        coins: 500,
        bonus_coins: 50,
        price_minor_units: 45_000,
        label: "500 Coins + 50 Bonus",
        popular: true,
    },
    CoinPackage {
        id: "coins_1000",
        coins: 1000,
        bonus_coins: 150,
        price_minor_units: 85_000,
        label: "1000 Coins + 150 Bonus",
        popular: false,
    },
    CoinPackage {
        id: "coins_2000",
        coins: 2000,
        bonus_coins: 400,
        price_minor_units: 160_000,
        label: "2000 Coins + 400 Bonus",
        popular: false,
    },
];

/// Premium windows on sale.
pub const PREMIUM_PACKAGES: [PremiumPackage; 4] = [
    PremiumPackage {
        id: "premium_1m",
        months: 1,
        price_minor_units: 49_000,
        label: "1 Month Premium",
        popular: false,
        discount_percent: 0,
    },
    PremiumPackage {
        id: "premium_3m",
        months: 3,
        price_minor_units: 129_000,
        label: "3 Months Premium",
        popular: true,
        discount_percent: 12,
    },
    PremiumPackage {
        id: "premium_6m",
        months: 6,
        price_minor_units: 239_000,
        label: "6 Months Premium",
        popular: false,
        discount_percent: 19,
    },
    PremiumPackage {
        id: "premium_12m",
        months: 12,
        price_minor_units: 449_000,
        label: "12 Months Premium",
        popular: false,
        discount_percent: 24,
    },
];

/// A package resolved from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Package<'a> {
    /// A coin bundle.
    Coins(&'a CoinPackage),
    /// A premium window.
    Premium(&'a PremiumPackage),
}

impl Package<'_> {
    /// Package id.
    #[must_use]
    pub const fn id(&self) -> &'static str {
        match self {
            Self::Coins(p) => p.id,
            Self::Premium(p) => p.id,
        }
    }

    /// Display label, recorded on the transaction.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Coins(p) => p.label,
            Self::Premium(p) => p.label,
        }
    }

    /// Price in IDR.
    #[must_use]
    pub const fn price_minor_units(&self) -> i64 {
        match self {
            Self::Coins(p) => p.price_minor_units,
            Self::Premium(p) => p.price_minor_units,
        }
    }

    /// The transaction kind a purchase of this package produces.
    #[must_use]
    pub const fn transaction_kind(&self) -> TransactionKind {
        match self {
            Self::Coins(p) => TransactionKind::CoinPurchase {
                coins: p.total_coins(),
            },
            Self::Premium(p) => TransactionKind::PremiumPurchase { months: p.months },
        }
    }
}

/// The set of packages on sale.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    /// Coin bundles.
    pub coins: Vec<CoinPackage>,
    /// Premium windows.
    pub premium: Vec<PremiumPackage>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            coins: COIN_PACKAGES.to_vec(),
            premium: PREMIUM_PACKAGES.to_vec(),
        }
    }
}

impl Catalog {
    /// Look up a package by id.
    #[must_use]
    pub fn find(&self, package_id: &str) -> Option<Package<'_>> {
        self.coins
            .iter()
            .find(|p| p.id == package_id)
            .map(Package::Coins)
            .or_else(|| {
                self.premium
                    .iter()
                    .find(|p| p.id == package_id)
                    .map(Package::Premium)
            })
    }

    /// Look up a package by id, failing for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns `EntitlementError::UnknownPackage` if no package has this id.
    pub fn require(&self, package_id: &str) -> Result<Package<'_>> {
        self.find(package_id)
            .ok_or_else(|| EntitlementError::UnknownPackage(package_id.to_string()))
    }

    /// Look up a package by display label.
    ///
    /// Legacy records only kept the label, so migration recovers grants this way.
    #[must_use]
    pub fn find_by_label(&self, label: &str) -> Option<Package<'_>> {
        self.coins
            .iter()
            .find(|p| p.label == label)
            .map(Package::Coins)
            .or_else(|| {
                self.premium
                    .iter()
                    .find(|p| p.label == label)
                    .map(Package::Premium)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_packages_include_bonus() {
        let catalog = Catalog::default();
        let package = catalog.require("coins_500").unwrap();
        assert_eq!(
            package.transaction_kind(),
            TransactionKind::CoinPurchase { coins: 550 }
        );
        assert_eq!(package.price_minor_units(), 45_000);
    }

    #[test]
    fn premium_packages_map_to_months() {
        let catalog = Catalog::default();
        let package = catalog.require("premium_12m").unwrap();
        assert_eq!(
            package.transaction_kind(),
            TransactionKind::PremiumPurchase { months: 12 }
        );
        assert_eq!(package.label(), "12 Months Premium");
    }

    #[test]
    fn unknown_package_is_rejected() {
        let catalog = Catalog::default();
        assert!(catalog.find("coins_999").is_none());
        assert_eq!(
            catalog.require("coins_999"),
            Err(EntitlementError::UnknownPackage("coins_999".into()))
        );
    }

    #[test]
    fn lookup_by_label() {
        let catalog = Catalog::default();
        assert_eq!(
            catalog.find_by_label("3 Months Premium").map(|p| p.id()),
            Some("premium_3m")
        );
        assert!(catalog.find_by_label("Mystery Box").is_none());
    }
}
