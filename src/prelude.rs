//! Prelude

pub use crate::rcc::RccExt as _stm32u5xx_hal_rcc_RccExt;
pub use crate::ucpd::UcpdExt as _stm32u5xx_hal_ucpd_UcpdExt;
