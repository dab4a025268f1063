//! Withholding tax and net payout calculation
//!
//! Pure function of `(region, requested_amount)` plus the fixed FX table.
//! All arithmetic is integer or `Decimal`; two calls with the same input
//! always produce the same output, which the audit trail depends on.
//!
//! Home region: aggregate 3.3% withholding, reported as two components
//! (3% income tax, 0.3% resident surtax). Other regions: no withholding,
//! net converted at the externally supplied rate.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::config::FxTable;
use crate::core_types::{Currency, Region};
use crate::models::WithdrawalRequest;

/// Aggregate withholding in permille: 3% income tax + 0.3% surtax
const WITHHOLDING_PERMILLE: i64 = 33;
/// Income-tax component in permille
const INCOME_TAX_PERMILLE: i64 = 30;

/// Tax and payout breakdown for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    /// Gross requested amount in points
    pub gross: i64,
    /// Income-tax component (home region only)
    pub income_tax: i64,
    /// Resident-surtax component (home region only)
    pub resident_surtax: i64,
    /// Total withheld, `income_tax + resident_surtax`
    pub withheld: i64,
    /// Net payout in the minor unit of `currency`
    pub net: i64,
    pub currency: Currency,
}

/// Compute the breakdown for one request.
pub fn assess(region: Region, requested_amount: i64, fx: &FxTable) -> Assessment {
    let currency = region.currency();
    match region {
        Region::Domestic => {
            // floor(gross * 3.3%) total; the surtax component absorbs the
            // rounding remainder so the parts always sum to the total
            let withheld = requested_amount * WITHHOLDING_PERMILLE / 1000;
            let income_tax = requested_amount * INCOME_TAX_PERMILLE / 1000;
            Assessment {
                gross: requested_amount,
                income_tax,
                resident_surtax: withheld - income_tax,
                withheld,
                net: requested_amount - withheld,
                currency,
            }
        }
        Region::Japan | Region::Us => {
            let rate = match region {
                Region::Japan => fx.jpy_per_point,
                _ => fx.usd_per_point,
            };
            let minor_scale = Decimal::from(10i64.pow(currency.minor_decimals()));
            let net = (Decimal::from(requested_amount) * rate * minor_scale)
                .floor()
                .to_i64()
                .unwrap_or(0);
            Assessment {
                gross: requested_amount,
                income_tax: 0,
                resident_surtax: 0,
                withheld: 0,
                net,
                currency,
            }
        }
    }
}

/// Recompute and store the derived fields on a request.
///
/// The only way `tax_amount`/`net_amount` are ever written.
pub fn apply(request: &mut WithdrawalRequest, fx: &FxTable) {
    let a = assess(request.region, request.requested_amount, fx);
    request.tax_amount = a.withheld;
    request.net_amount = a.net;
}

/// Format a minor-unit amount for display (`7500` cents -> `"75.00"`).
pub fn format_minor(amount: i64, currency: Currency) -> String {
    let decimals = currency.minor_decimals();
    if decimals == 0 {
        return amount.to_string();
    }
    let scale = 10i64.pow(decimals);
    format!(
        "{}.{:0width$}",
        amount / scale,
        (amount % scale).abs(),
        width = decimals as usize
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domestic_withholding_split() {
        let a = assess(Region::Domestic, 10_000, &FxTable::default());
        assert_eq!(a.withheld, 330);
        assert_eq!(a.income_tax, 300);
        assert_eq!(a.resident_surtax, 30);
        assert_eq!(a.net, 9_670);
        assert_eq!(a.currency, Currency::Krw);
    }

    #[test]
    fn test_domestic_floor_and_component_sum() {
        // 3.3% of 1,234 = 40.722 -> withheld 40; 3% = 37.02 -> 37
        let a = assess(Region::Domestic, 1_234, &FxTable::default());
        assert_eq!(a.withheld, 40);
        assert_eq!(a.income_tax, 37);
        assert_eq!(a.resident_surtax, 3);
        assert_eq!(a.income_tax + a.resident_surtax, a.withheld);
        assert_eq!(a.net + a.withheld, a.gross);
    }

    #[test]
    fn test_japan_fixed_rate_no_withholding() {
        let a = assess(Region::Japan, 10_000, &FxTable::default());
        assert_eq!(a.withheld, 0);
        assert_eq!(a.net, 90_000);
        assert_eq!(a.currency, Currency::Jpy);
    }

    #[test]
    fn test_us_fixed_rate_in_cents() {
        // 100,000 points * 0.00075 USD = 75 USD = 7,500 cents
        let a = assess(Region::Us, 100_000, &FxTable::default());
        assert_eq!(a.withheld, 0);
        assert_eq!(a.net, 7_500);
        assert_eq!(format_minor(a.net, a.currency), "75.00");
    }

    #[test]
    fn test_assess_is_reproducible() {
        let fx = FxTable::default();
        let first = assess(Region::Us, 33_333, &fx);
        for _ in 0..100 {
            assert_eq!(assess(Region::Us, 33_333, &fx), first);
        }
    }

    #[test]
    fn test_format_minor_zero_decimal_currencies() {
        assert_eq!(format_minor(9_670, Currency::Krw), "9670");
        assert_eq!(format_minor(90_000, Currency::Jpy), "90000");
        assert_eq!(format_minor(7_505, Currency::Usd), "75.05");
    }
}
