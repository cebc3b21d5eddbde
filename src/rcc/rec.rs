//! Peripheral Reset and Enable Control (REC)
//!
//! This module contains safe accessors to the RCC reset, enable and
//! low-power clock gating functionality for each peripheral.
//!
//! Each peripheral implements [ResetEnable](trait.ResetEnable.html).
//!
//! # Reset/Enable Example
//!
//! ```no_run
//! # use stm32u5xx_hal::{pac, prelude::*, rcc::ResetEnable};
//! # let dp = pac::Peripherals::take().unwrap();
//! let rcc = dp.RCC.constrain();
//!
//! // Enable the clock to a peripheral and reset it
//! rcc.peripheral.UCPD1.enable().reset();
//! ```
//!
//! If a REC object is dropped by user code, then the Reset or Enable
//! state of this peripheral cannot be modified for the lifetime of the
//! program.
#![deny(missing_docs)]

use core::marker::PhantomData;

use crate::stm32::RCC;
use cortex_m::interrupt;
use paste;

/// A trait for Resetting, Enabling and Disabling a single peripheral
pub trait ResetEnable {
    /// Enable this peripheral
    #[allow(clippy::return_self_not_must_use)]
    fn enable(self) -> Self;
    /// Disable this peripheral
    #[allow(clippy::return_self_not_must_use)]
    fn disable(self) -> Self;
    /// Reset this peripheral
    #[allow(clippy::return_self_not_must_use)]
    fn reset(self) -> Self;
}

/// The clock gating state of a peripheral in low-power mode
#[derive(Default, Copy, Clone, PartialEq, Eq)]
pub enum LowPowerMode {
    /// Kernel and bus interface clocks are not provided in low-power modes.
    Off,
    /// Kernel and bus interface clocks are provided in Sleep and Stop modes.
    #[default]
    Enabled,
}

// This macro uses the paste::item! macro to create identifiers.
//
// https://crates.io/crates/paste
//
// Each peripheral is given by its name and the enable/reset/low-power
// bus registers it is controlled from.
macro_rules! peripheral_reset_and_enable_control {
    ($($p:ident => ($enr:ident, $rstr:ident, $smenr:ident),)+) => {
        paste::item! {
            /// Peripheral Reset and Enable Control
            #[allow(non_snake_case)]
            #[non_exhaustive]
            pub struct PeripheralREC {
                $(
                    #[allow(missing_docs)]
                    pub [< $p:upper >]: $p,
                )+
            }
            impl PeripheralREC {
                /// Return a new instance of the peripheral resets /
                /// enables
                ///
                /// # Safety
                ///
                /// If this method is called multiple times, then multiple
                /// accesses to the same memory exist.
                pub(super) unsafe fn new_singleton() -> PeripheralREC {
                    PeripheralREC {
                        $(
                            [< $p:upper >]: $p {
                                _marker: PhantomData,
                            },
                        )+
                    }
                }
            }
            $(
                #[doc = " Reset, Enable and Low-power mode control for " $p]
                pub struct $p {
                    pub(crate) _marker: PhantomData<*const ()>,
                }
                unsafe impl Send for $p {}
                impl ResetEnable for $p {
                    #[inline(always)]
                    fn enable(self) -> Self {
                        // unsafe: Owned exclusive access to this bitfield
                        interrupt::free(|_| {
                            let enr = unsafe { (*RCC::ptr()).$enr() };
                            enr.modify(|_, w| w.[< $p:lower en >]().set_bit());
                        });
                        self
                    }
                    #[inline(always)]
                    fn disable(self) -> Self {
                        // unsafe: Owned exclusive access to this bitfield
                        interrupt::free(|_| {
                            let enr = unsafe { (*RCC::ptr()).$enr() };
                            enr.modify(|_, w| w.[< $p:lower en >]().clear_bit());
                        });
                        self
                    }
                    #[inline(always)]
                    fn reset(self) -> Self {
                        // unsafe: Owned exclusive access to this bitfield
                        interrupt::free(|_| {
                            let rstr = unsafe { (*RCC::ptr()).$rstr() };
                            rstr.modify(|_, w| w.[< $p:lower rst >]().set_bit());
                            rstr.modify(|_, w| w.[< $p:lower rst >]().clear_bit());
                        });
                        self
                    }
                }
                impl $p {
                    /// Set Low Power Mode for peripheral
                    #[allow(clippy::return_self_not_must_use)]
                    pub fn low_power(self, lpm: LowPowerMode) -> Self {
                        // unsafe: Owned exclusive access to this bitfield
                        interrupt::free(|_| {
                            let smenr = unsafe { (*RCC::ptr()).$smenr() };
                            smenr.modify(|_, w| w.[< $p:lower smen >]()
                                         .bit(lpm != LowPowerMode::Off));
                        });
                        self
                    }
                }
            )+
        }
    };
}

peripheral_reset_and_enable_control! {
    Ucpd1 => (apb1enr2, apb1rstr2, apb1smenr2),
}
