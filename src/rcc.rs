//! Reset and Clock Control
//!
//! This module exposes the reset, enable and low-power clock gating
//! controls of the RCC unit on a per-peripheral basis. Constrain the
//! RCC peripheral to obtain the [`rec`](rec) members:
//!
//! ```no_run
//! # use stm32u5xx_hal::{pac, prelude::*, rcc::ResetEnable};
//! let dp = pac::Peripherals::take().unwrap();
//!
//! let rcc = dp.RCC.constrain();
//!
//! // Enable the clock to a peripheral and reset it
//! let prec = rcc.peripheral.UCPD1.enable().reset();
//! ```
//!
//! Clock tree configuration (PLL setup, bus prescalers) is performed
//! separately; the peripherals in this crate take their timing
//! parameters as explicit divider values.

use crate::stm32::RCC;

pub mod rec;
pub use rec::{LowPowerMode, PeripheralREC, ResetEnable};

/// Extension trait that constrains the `RCC` peripheral
pub trait RccExt {
    /// Constrains the `RCC` peripheral so it plays nicely with the
    /// other abstractions
    fn constrain(self) -> Rcc;
}

impl RccExt for RCC {
    fn constrain(self) -> Rcc {
        Rcc {
            // unsafe: only constructed once, by consuming the RCC
            // peripheral singleton
            peripheral: unsafe { rec::PeripheralREC::new_singleton() },
            rb: self,
        }
    }
}

/// Constrained RCC peripheral
pub struct Rcc {
    /// Per-peripheral reset / enable / low-power controls
    pub peripheral: PeripheralREC,
    #[allow(dead_code)]
    pub(crate) rb: RCC,
}

impl Rcc {
    /// Returns all the peripheral resets / enables.
    ///
    /// # Safety
    ///
    /// If this method is called multiple times, then multiple accesses
    /// to the same memory exist.
    #[inline]
    pub unsafe fn steal_peripheral_rec(&self) -> PeripheralREC {
        PeripheralREC::new_singleton()
    }
}
