//! UCPD configuration types
//!
//! [`Config`] carries the static timing configuration applied while the
//! peripheral is disabled. The remaining enums encode the control values
//! written at runtime (roles, resistors, ordered sets, modes).

/// UCPD clock (ucpd_clk) prescaler, applied to the kernel clock.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockPrescaler {
    /// No division
    #[default]
    Div1 = 0,
    /// Divide by 2
    Div2 = 1,
    /// Divide by 4
    Div4 = 2,
    /// Divide by 8
    Div8 = 3,
    /// Divide by 16
    Div16 = 4,
}

/// Receiver ordered set acceptance mask (which framing sequences the
/// receiver reacts to).
///
/// Combine individual sets with `|`:
///
/// ```
/// # use stm32u5xx_hal::ucpd::RxOrderedSets;
/// let accepted = RxOrderedSets::SOP | RxOrderedSets::SOP1 | RxOrderedSets::HARD_RESET;
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxOrderedSets(pub(crate) u16);

impl RxOrderedSets {
    /// SOP detection
    pub const SOP: Self = Self(1 << 0);
    /// SOP' detection
    pub const SOP1: Self = Self(1 << 1);
    /// SOP'' detection
    pub const SOP2: Self = Self(1 << 2);
    /// Hard Reset detection
    pub const HARD_RESET: Self = Self(1 << 3);
    /// Cable Reset detection
    pub const CABLE_RESET: Self = Self(1 << 4);
    /// SOP' Debug detection
    pub const SOP1_DEBUG: Self = Self(1 << 5);
    /// SOP'' Debug detection
    pub const SOP2_DEBUG: Self = Self(1 << 6);
    /// SOP extension #1 detection
    pub const SOP_EXT1: Self = Self(1 << 7);
    /// SOP extension #2 detection
    pub const SOP_EXT2: Self = Self(1 << 8);
    /// No ordered set accepted
    pub const NONE: Self = Self(0);

    /// Raw CFG1.RXORDSETEN value
    pub fn bits(self) -> u16 {
        self.0
    }
}

impl core::ops::BitOr for RxOrderedSets {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for RxOrderedSets {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Default for RxOrderedSets {
    fn default() -> Self {
        Self::SOP | Self::HARD_RESET
    }
}

/// Static UCPD timing configuration.
///
/// The dividers are given as plain ratios; they are range-checked and
/// encoded when the configuration is applied. With the ucpd_clk sourced
/// from HSI16 the defaults produce the USB-PD nominal 300 kbps half-bit
/// rate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// ucpd_clk prescaler
    pub clock_prescaler: ClockPrescaler,
    /// Half-bit clock divider, ratio 1..=64 (produces ~600 kHz from the
    /// prescaled clock at the USB-PD nominal rate)
    pub half_bit_clock_divider: u8,
    /// Transition window divider, ratio 2..=32 (clocked from the
    /// half-bit clock)
    pub transition_window_divider: u8,
    /// Inter-frame gap timer divider, ratio 2..=32 (clocked from the
    /// prescaled ucpd_clk)
    pub inter_frame_gap_divider: u8,
    /// Ordered sets accepted by the receiver
    pub rx_ordered_sets: RxOrderedSets,
}

impl Config {
    /// Timing configuration for a 16 MHz kernel clock (HSI16), per the
    /// reference manual recommendation.
    pub fn new() -> Self {
        Config {
            clock_prescaler: ClockPrescaler::Div1,
            half_bit_clock_divider: 27,
            transition_window_divider: 9,
            inter_frame_gap_divider: 16,
            rx_ordered_sets: RxOrderedSets::default(),
        }
    }

    /// Set the ucpd_clk prescaler
    #[must_use]
    pub fn clock_prescaler(mut self, psc: ClockPrescaler) -> Self {
        self.clock_prescaler = psc;
        self
    }

    /// Set the half-bit clock divider (ratio 1..=64)
    #[must_use]
    pub fn half_bit_clock_divider(mut self, div: u8) -> Self {
        self.half_bit_clock_divider = div;
        self
    }

    /// Set the transition window divider (ratio 2..=32)
    #[must_use]
    pub fn transition_window_divider(mut self, div: u8) -> Self {
        self.transition_window_divider = div;
        self
    }

    /// Set the inter-frame gap divider (ratio 2..=32)
    #[must_use]
    pub fn inter_frame_gap_divider(mut self, div: u8) -> Self {
        self.inter_frame_gap_divider = div;
        self
    }

    /// Set the ordered sets accepted by the receiver
    #[must_use]
    pub fn rx_ordered_sets(mut self, sets: RxOrderedSets) -> Self {
        self.rx_ordered_sets = sets;
        self
    }

    pub(crate) fn is_valid(&self) -> bool {
        (1..=64).contains(&self.half_bit_clock_divider)
            && (2..=32).contains(&self.transition_window_divider)
            && (2..=32).contains(&self.inter_frame_gap_divider)
            && self.rx_ordered_sets.0 < (1 << 9)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

// K-codes used to build the transmitted ordered sets
const SYNC1: u32 = 0x18;
const SYNC2: u32 = 0x11;
const SYNC3: u32 = 0x06;
const RST1: u32 = 0x07;
const RST2: u32 = 0x19;

const fn ordered_set(k1: u32, k2: u32, k3: u32, k4: u32) -> u32 {
    k1 | (k2 << 5) | (k3 << 10) | (k4 << 15)
}

/// Ordered set written to the TX_ORDSET register, framing the next
/// transmitted message.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxOrderedSet {
    /// SOP
    #[default]
    Sop,
    /// SOP'
    Sop1,
    /// SOP''
    Sop2,
    /// Hard Reset
    HardReset,
    /// Cable Reset
    CableReset,
    /// SOP' Debug
    Sop1Debug,
    /// SOP'' Debug
    Sop2Debug,
}

impl TxOrderedSet {
    /// The 20-bit K-code sequence for this ordered set
    pub fn k_codes(self) -> u32 {
        match self {
            TxOrderedSet::Sop => ordered_set(SYNC1, SYNC1, SYNC1, SYNC2),
            TxOrderedSet::Sop1 => ordered_set(SYNC1, SYNC1, SYNC3, SYNC3),
            TxOrderedSet::Sop2 => ordered_set(SYNC1, SYNC3, SYNC1, SYNC3),
            TxOrderedSet::HardReset => ordered_set(RST1, RST1, RST1, RST2),
            TxOrderedSet::CableReset => ordered_set(RST1, SYNC1, RST1, SYNC3),
            TxOrderedSet::Sop1Debug => ordered_set(SYNC1, RST2, RST2, SYNC3),
            TxOrderedSet::Sop2Debug => ordered_set(SYNC1, RST2, SYNC3, SYNC2),
        }
    }
}

/// Ordered set reported by the receiver for the message being received
/// (RX_ORDSET.RXORDSET).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectedRxOrderedSet {
    /// SOP
    Sop,
    /// SOP'
    Sop1,
    /// SOP''
    Sop2,
    /// SOP' Debug
    Sop1Debug,
    /// SOP'' Debug
    Sop2Debug,
    /// Cable Reset
    CableReset,
    /// SOP extension #1
    SopExt1,
    /// SOP extension #2
    SopExt2,
}

impl DetectedRxOrderedSet {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0x7 {
            0 => DetectedRxOrderedSet::Sop,
            1 => DetectedRxOrderedSet::Sop1,
            2 => DetectedRxOrderedSet::Sop2,
            3 => DetectedRxOrderedSet::Sop1Debug,
            4 => DetectedRxOrderedSet::Sop2Debug,
            5 => DetectedRxOrderedSet::CableReset,
            6 => DetectedRxOrderedSet::SopExt1,
            _ => DetectedRxOrderedSet::SopExt2,
        }
    }
}

/// Transmitter mode (CR.TXMODE)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxMode {
    /// Transmission of Tx packet
    #[default]
    Normal = 0b00,
    /// Cable Reset sequence
    CableReset = 0b01,
    /// BIST test sequence (BIST Carrier Mode 2)
    BistCarrier2 = 0b10,
}

/// Receiver mode (CR.RXMODE)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxMode {
    /// Normal receive mode
    #[default]
    Normal = 0,
    /// BIST receive mode (test data ignored)
    BistTestData = 1,
}

/// Power role, determining the analog function of the CC lines
/// (CR.ANAMODE)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// Source: Rp pull-up resistors presented on the CC lines
    #[default]
    Source = 0,
    /// Sink: Rd pull-down resistors presented on the CC lines
    Sink = 1,
}

/// Rp pull-up value advertised by a source (CR.ANASUBMODE)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RpValue {
    /// No pull-up
    None = 0b00,
    /// Default USB current
    #[default]
    Default = 0b01,
    /// 1.5 A
    Rp1_5A = 0b10,
    /// 3.0 A
    Rp3_0A = 0b11,
}

/// CC line analog PHY enable (CR.CCENABLE)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcEnable {
    /// Both PHYs disabled
    None = 0b00,
    /// CC1 PHY only
    Cc1 = 0b01,
    /// CC2 PHY only
    Cc2 = 0b10,
    /// Both CC1 and CC2 PHYs
    #[default]
    Both = 0b11,
}

/// A CC line selection
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcLine {
    /// CC1
    Cc1,
    /// CC2
    Cc2,
}

/// CC lines reported by a Type-C event
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcEvent {
    /// Event detected on CC1
    Cc1,
    /// Event detected on CC2
    Cc2,
    /// Event detected on both lines in the same status snapshot
    Cc1Cc2,
}

/// Rx pre-filter sampling method (CFG2.RXFILT2N3)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PreFilterSampling {
    /// 3 samples
    #[default]
    Samples3 = 0,
    /// 2 samples
    Samples2 = 1,
}

/// Rp value selected for trimming
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrimRp {
    /// Trim the 1.5 A Rp
    Rp1_5A,
    /// Trim the 3.0 A Rp
    Rp3_0A,
}

/// Voltage state measured on a CC line, interpreted according to the
/// current role.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VoltageState {
    /// Source role: CC voltage corresponds to an Ra state
    SrcRa,
    /// Source role: CC voltage corresponds to an Rd state
    SrcRd,
    /// Source role: CC voltage corresponds to an open line
    SrcOpen,
    /// Source role: invalid CC voltage
    SrcInvalid,
    /// Sink role: CC voltage corresponds to an Ra state
    SnkRa,
    /// Sink role: CC voltage corresponds to a default-current Rp
    SnkRpDefault,
    /// Sink role: CC voltage corresponds to a 1.5 A Rp
    SnkRp1_5A,
    /// Sink role: CC voltage corresponds to a 3.0 A Rp
    SnkRp3_0A,
}
