use serde::{Deserialize, Serialize};

use crate::utils::geo::round2;

/// Fare rules. All amounts in BRL.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    pub base_fare: f64,
    /// Distance covered by the base fare
    pub included_km: f64,
    pub per_km_rate: f64,
    pub emergency: f64,
    pub weekend: f64,
    pub carrier_box: f64,
    pub large_animal: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fare: 25.0,
            included_km: 5.0,
            per_km_rate: 3.0,
            emergency: 10.0,
            weekend: 5.0,
            carrier_box: 5.0,
            large_animal: 10.0,
        }
    }
}

/// Extras the customer ticks on the trip form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Surcharges {
    pub carrier_box: bool,
    pub large_animal: bool,
    pub emergency: bool,
    pub weekend: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceQuote {
    pub distance_km: f64,
    pub price: f64,
}

impl PriceQuote {
    pub fn price_display(&self) -> String {
        format!("{:.2}", self.price)
    }
}

impl PricingConfig {
    pub fn quote(&self, distance_km: f64, surcharges: &Surcharges) -> PriceQuote {
        let mut price = self.base_fare;

        if distance_km > self.included_km {
            price += (distance_km - self.included_km) * self.per_km_rate;
        }

        if surcharges.emergency {
            price += self.emergency;
        }
        if surcharges.weekend {
            price += self.weekend;
        }
        if surcharges.carrier_box {
            price += self.carrier_box;
        }
        if surcharges.large_animal {
            price += self.large_animal;
        }

        PriceQuote {
            distance_km,
            price: round2(price),
        }
    }
}
