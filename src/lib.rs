#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(non_camel_case_types)]

#[cfg(not(feature = "device-selected"))]
compile_error!(
    "This crate requires one of the following device features enabled:
        stm32u535
        stm32u545
        stm32u575
        stm32u585
        stm32u595
        stm32u599
        stm32u5a5
        stm32u5a9
"
);

#[cfg(feature = "stm32u535")]
pub use stm32u5::stm32u535 as stm32;

#[cfg(feature = "stm32u545")]
pub use stm32u5::stm32u545 as stm32;

#[cfg(feature = "stm32u575")]
pub use stm32u5::stm32u575 as stm32;

#[cfg(feature = "stm32u585")]
pub use stm32u5::stm32u585 as stm32;

#[cfg(feature = "stm32u595")]
pub use stm32u5::stm32u595 as stm32;

#[cfg(feature = "stm32u599")]
pub use stm32u5::stm32u599 as stm32;

#[cfg(feature = "stm32u5a5")]
pub use stm32u5::stm32u5a5 as stm32;

#[cfg(feature = "stm32u5a9")]
pub use stm32u5::stm32u5a9 as stm32;

#[cfg(feature = "device-selected")]
pub use crate::stm32 as pac;
#[cfg(feature = "device-selected")]
pub use crate::stm32 as device;

// Enable use of interrupt macro
#[cfg(feature = "rt")]
#[cfg_attr(docsrs, doc(cfg(feature = "rt")))]
pub use crate::stm32::interrupt;

#[cfg(feature = "device-selected")]
pub mod prelude;

#[cfg(feature = "device-selected")]
#[macro_use]
mod macros;

#[cfg(feature = "device-selected")]
pub mod rcc;

#[cfg(feature = "device-selected")]
pub mod ucpd;

#[cfg(feature = "device-selected")]
mod sealed {
    pub trait Sealed {}
}

#[cfg(feature = "device-selected")]
pub(crate) use sealed::Sealed;
