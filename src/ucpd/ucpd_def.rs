use core::marker::PhantomData;

use crate::rcc::rec;
use crate::stm32::{self, UCPD1};

use super::Instance;

// Implemented by all UCPD instances
macro_rules! ucpd {
    ($UCPDX:ty: $UcpdX:ident) => {
        paste::item! {
            impl Instance for $UCPDX {
                type Rec = rec::$UcpdX;

                fn rec() -> Self::Rec {
                    rec::$UcpdX { _marker: PhantomData }
                }

                fn disable_dead_battery(&self) {
                    // The CC lines keep their dead battery pull-down
                    // behavior until UCPDn_DBDIS is set.
                    let pwr = unsafe { &*stm32::PWR::ptr() };
                    pwr.ucpdr().modify(|_, w| w.ucpd_dbdis().set_bit());
                }
            }

            impl crate::Sealed for $UCPDX {}
        }
    };
}

ucpd! { UCPD1: Ucpd1 }
