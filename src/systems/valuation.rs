/// Prices the standing crop from maturity and quality.
#[derive(Debug, Clone, Copy)]
pub struct Valuation {
    market_scale: f64,
}

impl Valuation {
    pub fn new(market_scale: f64) -> Self {
        Self { market_scale }
    }

    pub fn market_value(&self, growth: f64, quality: f64) -> f64 {
        let growth = growth.clamp(0.0, 100.0) / 100.0;
        let quality = quality.clamp(0.0, 100.0) / 100.0;
        self.market_scale * growth * quality
    }
}
