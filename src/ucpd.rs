//! USB Type-C and Power Delivery interface (UCPD)
//!
//! This module drives the UCPD peripheral: BMC transmission and reception
//! of USB Power Delivery messages over the CC lines, Type-C voltage
//! detection and the hard reset, cable reset, Fast Role Swap and BIST
//! signalling paths.
//!
//! Message payloads move over DMA. The driver does not own the DMA
//! channels; any channel implementing [`DmaChannel`] can be bound per
//! direction, and its completion/abort events are fed back through
//! [`Ucpd::dma_tx_event`] and [`Ucpd::dma_rx_event`] from the DMA
//! interrupt handler.
//!
//! # Usage
//!
//! ```ignore
//! let dp = ...;                // Device peripherals
//! let rcc = dp.RCC.constrain();
//!
//! let mut ucpd = dp.UCPD1
//!     .ucpd(Config::new(), rcc.peripheral.UCPD1)?
//!     .with_tx_dma(tx_channel)
//!     .with_rx_dma(rx_channel);
//!
//! ucpd.set_callbacks(Callbacks {
//!     rx_complete: Some(on_message),
//!     type_c_event: Some(on_attach),
//!     ..Default::default()
//! })?;
//!
//! ucpd.set_role(Role::Sink);
//! ucpd.start()?;
//!
//! // Attach detection, then protocol traffic:
//! static mut RX_BUF: [u8; 30] = [0; 30];
//! ucpd.set_goodcrc_data(goodcrc_header)?;
//! ucpd.receive_dma(unsafe { &mut RX_BUF })?;
//! ```
//!
//! From the `UCPD1` interrupt, call [`Ucpd::irq_handler`]; from the DMA
//! channel interrupts, forward [`DmaEvent`]s to the matching
//! `dma_*_event` method. Callbacks run in interrupt context.

use core::ops::Deref;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::rcc::ResetEnable;
use crate::stm32::ucpd1;

pub mod config;
pub use config::{
    CcEnable, CcEvent, CcLine, ClockPrescaler, Config, DetectedRxOrderedSet,
    PreFilterSampling, Role, RpValue, RxMode, RxOrderedSets, TrimRp, TxMode,
    TxOrderedSet, VoltageState,
};

pub mod dma;
pub use dma::{DmaChannel, DmaError, DmaEvent, NoDma};

mod ucpd_def;

// SR bit positions, also used to mask against IMR
const SR_TXMSGDISC: u32 = 1 << 1;
const SR_TXMSGSENT: u32 = 1 << 2;
const SR_TXMSGABT: u32 = 1 << 3;
const SR_HRSTDISC: u32 = 1 << 4;
const SR_HRSTSENT: u32 = 1 << 5;
const SR_TXUND: u32 = 1 << 6;
const SR_RXORDDET: u32 = 1 << 9;
const SR_RXHRSTDET: u32 = 1 << 10;
const SR_RXOVR: u32 = 1 << 11;
const SR_RXMSGEND: u32 = 1 << 12;
const SR_RXERR: u32 = 1 << 13;
const SR_TYPECEVT1: u32 = 1 << 14;
const SR_TYPECEVT2: u32 = 1 << 15;
const SR_FRSEVT: u32 = 1 << 20;

// TXMODE and TXSEND live in the low CR bits; StopBIST restores CR
// without them
const CR_TXMODE_TXSEND: u32 = 0b111;

/// GoodCRC messages are a bare two byte header
const GOODCRC_SIZE: u16 = 2;

/// Largest value the TX_PAYSZ field can hold
const MAX_PAYLOAD_SIZE: usize = 0x3FF;

/// UCPD driver state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum State {
    /// Peripheral disabled, static configuration can be changed
    Configured = 0,
    /// Peripheral enabled, no transfer in progress
    Idle = 1,
    /// Transmission in progress
    Tx = 2,
    /// Reception in progress
    Rx = 3,
    /// User abort in progress
    Abort = 4,
}

impl State {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => State::Configured,
            1 => State::Idle,
            2 => State::Tx,
            3 => State::Rx,
            _ => State::Abort,
        }
    }
}

/// UCPD error
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The operation is not allowed in the current driver state
    Busy,
    /// A parameter is out of range
    InvalidParam,
    /// The operation needs a DMA channel and none is bound for that
    /// direction
    NotBound,
    /// A bound DMA channel failed to start or abort a transfer
    Dma(DmaError),
}

/// Accumulated error conditions, readable after an error callback.
///
/// The set is reset when a new transfer is started and when an abort
/// completes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCodes(u32);

impl ErrorCodes {
    /// No error recorded
    pub const NONE: Self = Self(0);
    /// The receiver flagged the message as invalid (bad CRC or
    /// incomplete)
    pub const RX_ERROR: Self = Self(1 << 0);
    /// Receive data register overrun
    pub const RX_OVERRUN: Self = Self(1 << 1);
    /// Transmit data register underrun
    pub const TX_UNDERRUN: Self = Self(1 << 2);
    /// A DMA channel reported an error
    pub const DMA: Self = Self(1 << 3);

    /// No error recorded
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// All errors in `other` are recorded here
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for ErrorCodes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for ErrorCodes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// Why the Tx channel is being aborted; selects the completion handling
// when the channel reports the abort done.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TxAbortReason {
    // abort() was called
    UserAbort,
    // The peripheral discarded the outgoing message (TXMSGDISC)
    MsgDiscard,
    // The peripheral aborted the outgoing message (TXMSGABT)
    MsgAbort,
    // A reception ended without a GoodCRC reply armed; the pre-armed
    // channel is released
    GoodCrcRelease,
}

pub trait Instance:
    crate::Sealed + Deref<Target = ucpd1::RegisterBlock>
{
    type Rec: ResetEnable;

    #[doc(hidden)]
    fn rec() -> Self::Rec;

    #[doc(hidden)]
    fn disable_dead_battery(&self);
}

/// Signature of the event callbacks.
pub type Callback<UCPD, TXDMA, RXDMA> = fn(&mut Ucpd<UCPD, TXDMA, RXDMA>);

/// Event notification hooks, all optional.
///
/// Callbacks run from [`Ucpd::irq_handler`], [`Ucpd::dma_tx_event`] or
/// [`Ucpd::dma_rx_event`], so in interrupt context. They receive the
/// driver handle and may start follow-up transfers from it.
pub struct Callbacks<UCPD, TXDMA, RXDMA> {
    /// A transmitted message went out fully (TXMSGSENT)
    pub tx_complete: Option<Callback<UCPD, TXDMA, RXDMA>>,
    /// The automatic GoodCRC reply went out fully
    pub goodcrc_sent: Option<Callback<UCPD, TXDMA, RXDMA>>,
    /// The outgoing message lost to incoming traffic and was discarded
    pub tx_discarded: Option<Callback<UCPD, TXDMA, RXDMA>>,
    /// The outgoing message was aborted by the peripheral
    pub tx_aborted: Option<Callback<UCPD, TXDMA, RXDMA>>,
    /// A message was fully received; read its size with
    /// [`Ucpd::rx_payload_size`]
    pub rx_complete: Option<Callback<UCPD, TXDMA, RXDMA>>,
    /// The receiver detected one of the enabled ordered sets; read it
    /// with [`Ucpd::detected_rx_ordered_set`]
    pub rx_ordered_set: Option<Callback<UCPD, TXDMA, RXDMA>>,
    /// A hard reset sequence went out fully
    pub hard_reset_sent: Option<Callback<UCPD, TXDMA, RXDMA>>,
    /// A hard reset sequence was received
    pub hard_reset_received: Option<Callback<UCPD, TXDMA, RXDMA>>,
    /// The hard reset sequence lost to incoming traffic and was
    /// discarded
    pub hard_reset_discarded: Option<Callback<UCPD, TXDMA, RXDMA>>,
    /// Voltage level changed on the indicated CC line(s)
    pub type_c_event: Option<fn(&mut Ucpd<UCPD, TXDMA, RXDMA>, CcEvent)>,
    /// A Fast Role Swap signal was received
    pub frs_received: Option<Callback<UCPD, TXDMA, RXDMA>>,
    /// An [`abort`](Ucpd::abort) request finished
    pub abort_complete: Option<Callback<UCPD, TXDMA, RXDMA>>,
    /// An error condition was recorded; read it with
    /// [`Ucpd::last_error_codes`]
    pub error: Option<Callback<UCPD, TXDMA, RXDMA>>,
}

impl<UCPD, TXDMA, RXDMA> Default for Callbacks<UCPD, TXDMA, RXDMA> {
    fn default() -> Self {
        Callbacks {
            tx_complete: None,
            goodcrc_sent: None,
            tx_discarded: None,
            tx_aborted: None,
            rx_complete: None,
            rx_ordered_set: None,
            hard_reset_sent: None,
            hard_reset_received: None,
            hard_reset_discarded: None,
            type_c_event: None,
            frs_received: None,
            abort_complete: None,
            error: None,
        }
    }
}

impl<UCPD, TXDMA, RXDMA> Clone for Callbacks<UCPD, TXDMA, RXDMA> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<UCPD, TXDMA, RXDMA> Copy for Callbacks<UCPD, TXDMA, RXDMA> {}

/// UCPD driver
pub struct Ucpd<UCPD, TXDMA = NoDma, RXDMA = NoDma> {
    ucpd: UCPD,
    tx_dma: TXDMA,
    rx_dma: RXDMA,
    state: AtomicU8,
    previous_state: State,
    callbacks: Callbacks<UCPD, TXDMA, RXDMA>,
    // GoodCRC header, DMA source for the pre-armed reply
    goodcrc: [u8; 2],
    last_error_codes: ErrorCodes,
    tx_abort_reason: Option<TxAbortReason>,
    rx_abort_pending: bool,
    bus_lock: AtomicBool,
}

pub trait UcpdExt<UCPD: Instance>: Sized {
    /// Take the peripheral, enable and reset its clock and apply the
    /// static configuration. The returned driver is stopped; call
    /// [`Ucpd::start`] once the control settings are in place.
    fn ucpd(
        self,
        config: Config,
        rec: UCPD::Rec,
    ) -> Result<Ucpd<UCPD, NoDma, NoDma>, Error>;
}

impl<UCPD: Instance> UcpdExt<UCPD> for UCPD {
    fn ucpd(
        self,
        config: Config,
        rec: UCPD::Rec,
    ) -> Result<Ucpd<UCPD, NoDma, NoDma>, Error> {
        Ucpd::new(self, config, rec)
    }
}

impl<UCPD: Instance> Ucpd<UCPD, NoDma, NoDma> {
    /// See [`UcpdExt::ucpd`]
    pub fn new(
        ucpd: UCPD,
        config: Config,
        rec: UCPD::Rec,
    ) -> Result<Self, Error> {
        if !config.is_valid() {
            return Err(Error::InvalidParam);
        }

        rec.enable().reset();

        // Release the CC lines from their dead battery behavior, they
        // are under UCPD control from here on
        ucpd.disable_dead_battery();

        let mut ucpd = Ucpd {
            ucpd,
            tx_dma: NoDma,
            rx_dma: NoDma,
            state: AtomicU8::new(State::Configured as u8),
            previous_state: State::Configured,
            callbacks: Callbacks::default(),
            goodcrc: [0; 2],
            last_error_codes: ErrorCodes::NONE,
            tx_abort_reason: None,
            rx_abort_pending: false,
            bus_lock: AtomicBool::new(false),
        };
        ucpd.write_config(&config);

        Ok(ucpd)
    }
}

impl<UCPD: Instance, TXDMA: DmaChannel, RXDMA: DmaChannel>
    Ucpd<UCPD, TXDMA, RXDMA>
{
    /// Bind a DMA channel to the transmit direction. Transmission and
    /// the automatic GoodCRC reply need one.
    ///
    /// Bind channels before [`start`](Self::start) and before
    /// [`set_callbacks`](Self::set_callbacks): the returned handle is a
    /// new type and starts over with no callbacks installed. The channel
    /// must be idle.
    pub fn with_tx_dma<D: DmaChannel>(
        self,
        tx_dma: D,
    ) -> Ucpd<UCPD, D, RXDMA> {
        Ucpd {
            ucpd: self.ucpd,
            tx_dma,
            rx_dma: self.rx_dma,
            state: self.state,
            previous_state: self.previous_state,
            callbacks: Callbacks::default(),
            goodcrc: self.goodcrc,
            last_error_codes: self.last_error_codes,
            tx_abort_reason: self.tx_abort_reason,
            rx_abort_pending: self.rx_abort_pending,
            bus_lock: self.bus_lock,
        }
    }

    /// Bind a DMA channel to the receive direction.
    ///
    /// As with [`with_tx_dma`](Self::with_tx_dma), any callbacks
    /// installed on the old handle are not carried over.
    pub fn with_rx_dma<D: DmaChannel>(
        self,
        rx_dma: D,
    ) -> Ucpd<UCPD, TXDMA, D> {
        Ucpd {
            ucpd: self.ucpd,
            tx_dma: self.tx_dma,
            rx_dma,
            state: self.state,
            previous_state: self.previous_state,
            callbacks: Callbacks::default(),
            goodcrc: self.goodcrc,
            last_error_codes: self.last_error_codes,
            tx_abort_reason: self.tx_abort_reason,
            rx_abort_pending: self.rx_abort_pending,
            bus_lock: self.bus_lock,
        }
    }

    /// Stop the peripheral, release its clock and return the resources.
    pub fn free(mut self) -> (UCPD, TXDMA, RXDMA) {
        if matches!(self.state(), State::Tx | State::Rx | State::Abort) {
            self.ucpd.imr().reset();
            let _ = self.tx_dma.abort();
            let _ = self.rx_dma.abort();
        }
        self.ucpd.cfgr1().modify(|_, w| w.ucpden().clear_bit());
        UCPD::rec().reset().disable();

        (self.ucpd, self.tx_dma, self.rx_dma)
    }

    // ------------------------------------------------------------------
    // State handling

    /// Current driver state
    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Driver state before the last transition, used to resume after a
    /// nested operation such as the GoodCRC reply.
    pub fn previous_state(&self) -> State {
        self.previous_state
    }

    fn set_state(&self, state: State) {
        self.state.store(state as u8, Ordering::Release);
    }

    // The single transition point for gated entry into Tx/Rx/Abort. A
    // concurrent transition from interrupt context loses the exchange
    // and the caller reports Busy.
    fn try_transition(&self, from: State, to: State) -> bool {
        self.state
            .compare_exchange(
                from as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn swap_restore_state(&mut self) {
        let current = self.state();
        let previous = self.previous_state;
        self.previous_state = current;
        self.set_state(previous);
    }

    /// Errors recorded since the last transfer started
    pub fn last_error_codes(&self) -> ErrorCodes {
        self.last_error_codes
    }

    /// Clear the recorded errors
    pub fn clear_last_error_codes(&mut self) {
        self.last_error_codes = ErrorCodes::NONE;
    }

    /// Claim the handle for a multi-step operation. Returns false if
    /// another claimant holds it. This is advisory bookkeeping for
    /// protocol layers sharing the handle; the driver does not check it.
    pub fn try_acquire_bus(&self) -> bool {
        !self.bus_lock.swap(true, Ordering::Acquire)
    }

    /// Release a claim taken with [`try_acquire_bus`](Self::try_acquire_bus).
    pub fn release_bus(&self) {
        self.bus_lock.store(false, Ordering::Release);
    }

    // ------------------------------------------------------------------
    // Static configuration (peripheral stopped)

    /// Install the event callbacks. Allowed while no transfer is in
    /// progress.
    pub fn set_callbacks(
        &mut self,
        callbacks: Callbacks<UCPD, TXDMA, RXDMA>,
    ) -> Result<(), Error> {
        match self.state() {
            State::Configured | State::Idle => {
                self.callbacks = callbacks;
                Ok(())
            }
            _ => Err(Error::Busy),
        }
    }

    /// Replace the static timing configuration. Only allowed while the
    /// peripheral is stopped.
    pub fn apply_config(&mut self, config: Config) -> Result<(), Error> {
        if self.state() != State::Configured {
            return Err(Error::Busy);
        }
        if !config.is_valid() {
            return Err(Error::InvalidParam);
        }
        self.write_config(&config);
        Ok(())
    }

    fn write_config(&mut self, config: &Config) {
        self.ucpd.cfgr1().modify(|_, w| unsafe {
            w.ucpden()
                .clear_bit()
                .psc_usbpdclk()
                .bits(config.clock_prescaler as u8)
                .hbitclkdiv()
                .set(config.half_bit_clock_divider - 1)
                .transwin()
                .bits(config.transition_window_divider - 1)
                .ifrgap()
                .bits(config.inter_frame_gap_divider - 1)
        });
        self.write_rx_ordered_sets(config.rx_ordered_sets);
    }

    // RXORDSETEN is generated as nine individual enable bits
    fn write_rx_ordered_sets(&mut self, sets: RxOrderedSets) {
        let bits = sets.bits();
        self.ucpd.cfgr1().modify(|_, w| {
            w.rxordseten0()
                .bit(bits & (1 << 0) != 0)
                .rxordseten1()
                .bit(bits & (1 << 1) != 0)
                .rxordseten2()
                .bit(bits & (1 << 2) != 0)
                .rxordseten3()
                .bit(bits & (1 << 3) != 0)
                .rxordseten4()
                .bit(bits & (1 << 4) != 0)
                .rxordseten5()
                .bit(bits & (1 << 5) != 0)
                .rxordseten6()
                .bit(bits & (1 << 6) != 0)
                .rxordseten7()
                .bit(bits & (1 << 7) != 0)
                .rxordseten8()
                .bit(bits & (1 << 8) != 0)
        });
    }

    /// Read the applied timing configuration back from the peripheral.
    pub fn get_config(&self) -> Config {
        let cfgr1 = self.ucpd.cfgr1().read();

        let clock_prescaler = match cfgr1.psc_usbpdclk().bits() {
            0 => ClockPrescaler::Div1,
            1 => ClockPrescaler::Div2,
            2 => ClockPrescaler::Div4,
            3 => ClockPrescaler::Div8,
            _ => ClockPrescaler::Div16,
        };

        let mut rx_ordered_sets = RxOrderedSets::NONE;
        if cfgr1.rxordseten0().bit_is_set() {
            rx_ordered_sets |= RxOrderedSets::SOP;
        }
        if cfgr1.rxordseten1().bit_is_set() {
            rx_ordered_sets |= RxOrderedSets::SOP1;
        }
        if cfgr1.rxordseten2().bit_is_set() {
            rx_ordered_sets |= RxOrderedSets::SOP2;
        }
        if cfgr1.rxordseten3().bit_is_set() {
            rx_ordered_sets |= RxOrderedSets::HARD_RESET;
        }
        if cfgr1.rxordseten4().bit_is_set() {
            rx_ordered_sets |= RxOrderedSets::CABLE_RESET;
        }
        if cfgr1.rxordseten5().bit_is_set() {
            rx_ordered_sets |= RxOrderedSets::SOP1_DEBUG;
        }
        if cfgr1.rxordseten6().bit_is_set() {
            rx_ordered_sets |= RxOrderedSets::SOP2_DEBUG;
        }
        if cfgr1.rxordseten7().bit_is_set() {
            rx_ordered_sets |= RxOrderedSets::SOP_EXT1;
        }
        if cfgr1.rxordseten8().bit_is_set() {
            rx_ordered_sets |= RxOrderedSets::SOP_EXT2;
        }

        Config {
            clock_prescaler,
            half_bit_clock_divider: cfgr1.hbitclkdiv().bits() + 1,
            transition_window_divider: cfgr1.transwin().bits() + 1,
            inter_frame_gap_divider: cfgr1.ifrgap().bits() + 1,
            rx_ordered_sets,
        }
    }

    /// Change the ordered sets the receiver accepts. Only allowed while
    /// the peripheral is stopped.
    pub fn set_rx_ordered_sets(
        &mut self,
        sets: RxOrderedSets,
    ) -> Result<(), Error> {
        if self.state() != State::Configured {
            return Err(Error::Busy);
        }
        self.write_rx_ordered_sets(sets);
        Ok(())
    }

    /// Enable or disable the Rx pre-filter. Only allowed while the
    /// peripheral is stopped.
    pub fn set_rx_pre_filter(&mut self, enabled: bool) -> Result<(), Error> {
        if self.state() != State::Configured {
            return Err(Error::Busy);
        }
        self.ucpd
            .cfgr2()
            .modify(|_, w| w.rxfiltdis().bit(!enabled));
        Ok(())
    }

    /// Select the Rx pre-filter sampling method. Only allowed while the
    /// peripheral is stopped.
    pub fn set_pre_filter_sampling(
        &mut self,
        sampling: PreFilterSampling,
    ) -> Result<(), Error> {
        if self.state() != State::Configured {
            return Err(Error::Busy);
        }
        self.ucpd.cfgr2().modify(|_, w| {
            w.rxfilt2n3().bit(sampling == PreFilterSampling::Samples2)
        });
        Ok(())
    }

    /// Enable or disable wakeup from Stop mode on Type-C activity. Only
    /// allowed while the peripheral is stopped.
    pub fn set_wakeup_mode(&mut self, enabled: bool) -> Result<(), Error> {
        if self.state() != State::Configured {
            return Err(Error::Busy);
        }
        self.ucpd.cfgr2().modify(|_, w| w.wupen().bit(enabled));
        Ok(())
    }

    /// Force the clock request to stay asserted, keeping the kernel
    /// clock running in low-power modes. Only allowed while the
    /// peripheral is stopped.
    pub fn set_force_clock(&mut self, enabled: bool) -> Result<(), Error> {
        if self.state() != State::Configured {
            return Err(Error::Busy);
        }
        self.ucpd.cfgr2().modify(|_, w| w.forceclk().bit(enabled));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle

    /// Enable the peripheral. The static configuration is locked until
    /// [`stop`](Self::stop).
    pub fn start(&mut self) -> Result<(), Error> {
        if !self.try_transition(State::Configured, State::Idle) {
            return Err(Error::Busy);
        }
        self.previous_state = State::Configured;
        self.ucpd.cfgr1().modify(|_, w| w.ucpden().set_bit());
        Ok(())
    }

    /// Disable the peripheral. The control settings are reset by
    /// hardware; the static configuration is kept and can be changed
    /// again.
    pub fn stop(&mut self) -> Result<(), Error> {
        let state = self.state();
        if state == State::Configured {
            return Err(Error::Busy);
        }
        self.ucpd.cfgr1().modify(|_, w| w.ucpden().clear_bit());
        self.previous_state = state;
        self.set_state(State::Configured);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Control (peripheral started)

    /// Enable the PHY receiver.
    pub fn enable_rx_phy(&mut self) {
        self.ucpd.cr().modify(|_, w| w.phyrxen().set_bit());
    }

    /// Disable the PHY receiver.
    pub fn disable_rx_phy(&mut self) {
        self.ucpd.cr().modify(|_, w| w.phyrxen().clear_bit());
    }

    /// Set the power role, selecting the resistors presented on the CC
    /// lines.
    pub fn set_role(&mut self, role: Role) {
        self.ucpd
            .cr()
            .modify(|_, w| w.anamode().bit(role == Role::Sink));
    }

    /// Current power role
    pub fn role(&self) -> Role {
        if self.ucpd.cr().read().anamode().bit_is_set() {
            Role::Sink
        } else {
            Role::Source
        }
    }

    /// Select the Rp pull-up advertised in the source role.
    pub fn set_rp_value(&mut self, rp: RpValue) {
        self.ucpd
            .cr()
            .modify(|_, w| w.anasubmode().set(rp as u8));
    }

    /// Enable the analog PHYs on the given CC line(s).
    pub fn set_cc_lines(&mut self, cc: CcEnable) {
        self.ucpd.cr().modify(|_, w| w.ccenable().set(cc as u8));
    }

    /// Select the CC line carrying the PD traffic (usually the line on
    /// which attach was detected).
    pub fn set_active_cc(&mut self, line: CcLine) {
        self.ucpd
            .cr()
            .modify(|_, w| w.phyccsel().bit(line == CcLine::Cc2));
    }

    /// Enable the Type-C voltage detector and its event interrupt on
    /// the given CC line.
    pub fn enable_type_c_detector(&mut self, line: CcLine) {
        match line {
            CcLine::Cc1 => {
                self.ucpd.cr().modify(|_, w| w.cc1tcdis().clear_bit());
                self.ucpd.imr().modify(|_, w| w.typecevt1ie().set_bit());
            }
            CcLine::Cc2 => {
                self.ucpd.cr().modify(|_, w| w.cc2tcdis().clear_bit());
                self.ucpd.imr().modify(|_, w| w.typecevt2ie().set_bit());
            }
        }
    }

    /// Disable the Type-C voltage detector and its event interrupt on
    /// the given CC line.
    pub fn disable_type_c_detector(&mut self, line: CcLine) {
        match line {
            CcLine::Cc1 => {
                self.ucpd.cr().modify(|_, w| w.cc1tcdis().set_bit());
                self.ucpd.imr().modify(|_, w| w.typecevt1ie().clear_bit());
            }
            CcLine::Cc2 => {
                self.ucpd.cr().modify(|_, w| w.cc2tcdis().set_bit());
                self.ucpd.imr().modify(|_, w| w.typecevt2ie().clear_bit());
            }
        }
    }

    /// Enable or disable Vconn discharge on the CC lines.
    pub fn set_vconn_discharge(&mut self, enabled: bool) {
        self.ucpd.cr().modify(|_, w| w.rdch().bit(enabled));
    }

    /// Set the ordered set framing the next transmitted message.
    pub fn set_tx_ordered_set(&mut self, set: TxOrderedSet) {
        self.ucpd
            .tx_ordsetr()
            .write(|w| w.txordset().set(set.k_codes()));
    }

    /// Select the receiver mode.
    pub fn set_rx_mode(&mut self, mode: RxMode) {
        self.ucpd
            .cr()
            .modify(|_, w| w.rxmode().bit(mode == RxMode::BistTestData));
    }

    /// Enable Fast Role Swap reception and its interrupt.
    pub fn enable_frs_rx(&mut self) {
        self.ucpd.cr().modify(|_, w| w.frsrxen().set_bit());
        // FRSEVTIE has no field writer; IMR mirrors the SR bit layout
        self.ucpd
            .imr()
            .modify(|r, w| unsafe { w.bits(r.bits() | SR_FRSEVT) });
    }

    /// Disable Fast Role Swap reception and its interrupt.
    pub fn disable_frs_rx(&mut self) {
        self.ucpd.cr().modify(|_, w| w.frsrxen().clear_bit());
        self.ucpd
            .imr()
            .modify(|r, w| unsafe { w.bits(r.bits() & !SR_FRSEVT) });
    }

    /// Drive a Fast Role Swap signal on the active CC line.
    pub fn send_frs(&mut self) {
        self.ucpd.cr().modify(|_, w| w.frstx().set_bit());
    }

    /// Send a hard reset sequence. Completion is reported through the
    /// `hard_reset_sent` or `hard_reset_discarded` callback.
    pub fn send_hard_reset(&mut self) -> Result<(), Error> {
        if self.state() == State::Configured {
            return Err(Error::Busy);
        }
        self.ucpd
            .imr()
            .modify(|_, w| w.hrstsentie().set_bit().hrstdiscie().set_bit());
        self.ucpd.cr().modify(|_, w| w.txhrst().set_bit());
        Ok(())
    }

    /// Enable detection of received hard resets.
    pub fn enable_hard_reset_rx(&mut self) {
        self.ucpd.cr().modify(|_, w| w.phyrxen().set_bit());
        self.ucpd.imr().modify(|_, w| w.rxhrstdetie().set_bit());
    }

    /// Disable detection of received hard resets.
    pub fn disable_hard_reset_rx(&mut self) {
        self.ucpd.cr().modify(|_, w| w.phyrxen().clear_bit());
        self.ucpd.imr().modify(|_, w| w.rxhrstdetie().clear_bit());
    }

    /// Send a cable reset sequence. Completion is reported through the
    /// `tx_complete` callback, which also restores the Tx mode.
    pub fn send_cable_reset(&mut self) -> Result<(), Error> {
        let from = self.state();
        if !matches!(from, State::Idle | State::Rx)
            || !self.try_transition(from, State::Tx)
        {
            return Err(Error::Busy);
        }
        self.previous_state = from;

        self.ucpd.imr().modify(|_, w| w.txmsgsentie().set_bit());
        self.ucpd.cr().modify(|_, w| unsafe {
            w.txmode()
                .bits(TxMode::CableReset as u8)
                .txsend()
                .set_bit()
        });
        Ok(())
    }

    /// Start sending the BIST Carrier Mode 2 test sequence. The
    /// sequence runs until [`stop_bist`](Self::stop_bist).
    pub fn send_bist(&mut self) -> Result<(), Error> {
        if !self.try_transition(State::Idle, State::Tx) {
            return Err(Error::Busy);
        }
        self.previous_state = State::Idle;

        self.ucpd.cr().modify(|_, w| unsafe {
            w.txmode()
                .bits(TxMode::BistCarrier2 as u8)
                .txsend()
                .set_bit()
        });
        Ok(())
    }

    /// Stop the BIST test sequence. The carrier only stops on a
    /// peripheral disable, so the control context is saved and restored
    /// around an enable cycle.
    pub fn stop_bist(&mut self) -> Result<(), Error> {
        if self.state() != State::Tx {
            return Err(Error::Busy);
        }

        let saved_cr = self.ucpd.cr().read().bits() & !CR_TXMODE_TXSEND;

        self.ucpd.cfgr1().modify(|_, w| w.ucpden().clear_bit());
        self.ucpd.cfgr1().modify(|_, w| w.ucpden().set_bit());
        self.ucpd.cr().write(|w| unsafe { w.bits(saved_cr) });

        self.previous_state = State::Tx;
        self.set_state(State::Idle);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Status

    /// Voltage state on the given CC line, interpreted according to the
    /// current role.
    pub fn type_c_voltage_level(&self, line: CcLine) -> VoltageState {
        let sr = self.ucpd.sr().read();
        let vstate = match line {
            CcLine::Cc1 => sr.typec_vstate_cc1().bits(),
            CcLine::Cc2 => sr.typec_vstate_cc2().bits(),
        };
        let source = self.role() == Role::Source;

        match (vstate, source) {
            (0, true) => VoltageState::SrcRa,
            (0, false) => VoltageState::SnkRa,
            (1, true) => VoltageState::SrcRd,
            (1, false) => VoltageState::SnkRpDefault,
            (2, true) => VoltageState::SrcOpen,
            (2, false) => VoltageState::SnkRp1_5A,
            (_, true) => VoltageState::SrcInvalid,
            (_, false) => VoltageState::SnkRp3_0A,
        }
    }

    /// Ordered set detected for the message being received.
    pub fn detected_rx_ordered_set(&self) -> DetectedRxOrderedSet {
        DetectedRxOrderedSet::from_bits(
            self.ucpd.rx_ordsetr().read().rxordset().bits(),
        )
    }

    /// Payload size of the received message in bytes, valid from the
    /// `rx_complete` callback until the next reception.
    pub fn rx_payload_size(&self) -> u16 {
        self.ucpd.rx_payszr().read().rxpaysz().bits()
    }

    // ------------------------------------------------------------------
    // Trimming

    /// Apply the factory Rp trimming values for the given current
    /// advertisement to both CC lines. Only applicable to some device
    /// revisions; a no-op elsewhere.
    pub fn apply_rp_trimming(&mut self, rp: TrimRp) {
        if !trimming_applicable() {
            return;
        }

        // Engineering bytes in system flash
        let (cc1_addr, cc2_addr) = match rp {
            TrimRp::Rp3_0A => (0x0BFA_0545u32, 0x0BFA_0547u32),
            TrimRp::Rp1_5A => (0x0BFA_07A7u32, 0x0BFA_07A8u32),
        };
        let cc1 = unsafe { core::ptr::read_volatile(cc1_addr as *const u32) };
        let cc2 = unsafe { core::ptr::read_volatile(cc2_addr as *const u32) };

        self.ucpd.cfgr3().modify(|_, w| {
            w.trim1_ng_cc3a0()
                .set((cc1 & 0xF) as u8)
                .trim2_ng_cc3a0()
                .set((cc2 & 0xF) as u8)
        });
    }

    /// Apply the factory Rd trimming values to both CC lines. Only
    /// applicable to some device revisions; a no-op elsewhere.
    pub fn apply_rd_trimming(&mut self) {
        if !trimming_applicable() {
            return;
        }

        let cc1 =
            unsafe { core::ptr::read_volatile(0x0BFA_0544u32 as *const u32) };
        let cc2 =
            unsafe { core::ptr::read_volatile(0x0BFA_0546u32 as *const u32) };

        self.ucpd.cfgr3().modify(|_, w| {
            w.trim1_ng_ccrpd()
                .set((cc1 & 0xF) as u8)
                .trim2_ng_ccrpd()
                .set((cc2 & 0xF) as u8)
        });
    }

    // ------------------------------------------------------------------
    // Transfers

    /// Start a DMA transmission of `buf` with the currently selected Tx
    /// ordered set. Completion is reported through the `tx_complete`
    /// callback; loss against incoming traffic through `tx_discarded`
    /// or `tx_aborted`.
    ///
    /// The message must carry at least a header.
    pub fn transmit_dma(&mut self, buf: &'static [u8]) -> Result<(), Error> {
        if !TXDMA::BOUND {
            return Err(Error::NotBound);
        }
        if buf.len() < GOODCRC_SIZE as usize || buf.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::InvalidParam);
        }

        let from = self.state();
        if !matches!(from, State::Idle | State::Rx)
            || !self.try_transition(from, State::Tx)
        {
            return Err(Error::Busy);
        }
        self.previous_state = from;
        self.last_error_codes = ErrorCodes::NONE;

        let txdr = self.ucpd.txdr().as_ptr() as u32;
        if let Err(e) = unsafe {
            self.tx_dma.start_periph_transfer(
                buf.as_ptr() as u32,
                txdr,
                buf.len() as u16,
            )
        } {
            self.last_error_codes |= ErrorCodes::DMA;
            self.set_state(from);
            return Err(Error::Dma(e));
        }

        self.ucpd.cfgr1().modify(|_, w| w.txdmaen().set_bit());
        self.ucpd.imr().modify(|_, w| {
            w.txmsgdiscie()
                .set_bit()
                .txmsgabtie()
                .set_bit()
                .txundie()
                .set_bit()
        });
        self.ucpd
            .tx_payszr()
            .write(|w| w.txpaysz().set(buf.len() as u16));
        self.ucpd.cr().modify(|_, w| w.txsend().set_bit());

        Ok(())
    }

    /// Start a DMA reception into `buf`.
    ///
    /// If a Tx channel is bound it is pre-armed with the GoodCRC
    /// header, so that a reply set up with
    /// [`set_goodcrc_data`](Self::set_goodcrc_data) goes out within the
    /// inter-frame gap of a correctly received message. Completion is
    /// reported through the `rx_complete` callback, then `goodcrc_sent`
    /// once the reply is out.
    pub fn receive_dma(
        &mut self,
        buf: &'static mut [u8],
    ) -> Result<(), Error> {
        if !RXDMA::BOUND {
            return Err(Error::NotBound);
        }
        if buf.len() < GOODCRC_SIZE as usize || buf.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::InvalidParam);
        }
        if !self.try_transition(State::Idle, State::Rx) {
            return Err(Error::Busy);
        }
        self.previous_state = State::Idle;
        self.last_error_codes = ErrorCodes::NONE;

        let rxdr = self.ucpd.rxdr().as_ptr() as u32;
        if let Err(e) = unsafe {
            self.rx_dma.start_periph_transfer(
                rxdr,
                buf.as_mut_ptr() as u32,
                buf.len() as u16,
            )
        } {
            self.last_error_codes |= ErrorCodes::DMA;
            self.set_state(State::Idle);
            return Err(Error::Dma(e));
        }

        if TXDMA::BOUND {
            // Pre-arm the reply; safe while the handle does not move,
            // the transfer only runs between rx_complete and
            // goodcrc_sent
            let goodcrc = self.goodcrc.as_ptr() as u32;
            let txdr = self.ucpd.txdr().as_ptr() as u32;
            if let Err(e) = unsafe {
                self.tx_dma
                    .start_periph_transfer(goodcrc, txdr, GOODCRC_SIZE)
            } {
                let _ = self.rx_dma.abort();
                self.last_error_codes |= ErrorCodes::DMA;
                self.set_state(State::Idle);
                return Err(Error::Dma(e));
            }

            self.ucpd.imr().modify(|_, w| {
                w.txmsgdiscie()
                    .set_bit()
                    .txmsgabtie()
                    .set_bit()
                    .txundie()
                    .set_bit()
            });
        }

        self.ucpd.cfgr1().modify(|_, w| w.rxdmaen().set_bit());
        self.ucpd
            .imr()
            .modify(|_, w| w.rxovrie().set_bit().rxmsgendie().set_bit());
        self.ucpd.cr().modify(|_, w| w.phyrxen().set_bit());

        Ok(())
    }

    /// Arm the GoodCRC reply with the given message header and release
    /// it for automatic transmission after the next correctly received
    /// message. The header is sent little-endian.
    ///
    /// Call from the `rx_complete` callback once the received message
    /// has been validated. If the reply is not armed when the reception
    /// ends, the pre-armed Tx channel is released instead.
    pub fn set_goodcrc_data(&mut self, header: u16) -> Result<(), Error> {
        if !TXDMA::BOUND {
            return Err(Error::NotBound);
        }
        self.goodcrc = header.to_le_bytes();
        self.ucpd.cfgr1().modify(|_, w| w.txdmaen().set_bit());
        Ok(())
    }

    /// Abort any transfer in progress, asynchronously.
    ///
    /// DMA channel aborts are started in both directions; once neither
    /// direction has an abort outstanding the `abort_complete` callback
    /// runs exactly once and the driver is idle again. An aborted
    /// transmission is resolved by the TXMSGSENT interrupt for the
    /// discarded message.
    pub fn abort(&mut self) -> Result<(), Error> {
        let from = self.state();
        if matches!(from, State::Configured | State::Abort) {
            return Err(Error::Busy);
        }

        self.ucpd.imr().modify(|_, w| {
            w.rxovrie()
                .clear_bit()
                .rxmsgendie()
                .clear_bit()
                .txundie()
                .clear_bit()
                .txmsgabtie()
                .clear_bit()
                .txmsgdiscie()
                .clear_bit()
        });
        // TXMSGSENT signals the end of a Tx abort
        self.ucpd.imr().modify(|_, w| w.txmsgsentie().set_bit());

        self.previous_state = from;
        self.set_state(State::Abort);

        let mut outstanding = false;

        if TXDMA::BOUND {
            self.ucpd.cfgr1().modify(|_, w| w.txdmaen().clear_bit());
            if self.tx_dma.is_active() {
                self.tx_abort_reason = Some(TxAbortReason::UserAbort);
                if self.tx_dma.abort_async().is_ok() {
                    outstanding = true;
                } else {
                    self.tx_abort_reason = None;
                }
            }
        }

        if RXDMA::BOUND {
            self.ucpd.cfgr1().modify(|_, w| w.rxdmaen().clear_bit());
            if self.rx_dma.is_active() {
                self.rx_abort_pending = true;
                if self.rx_dma.abort_async().is_ok() {
                    outstanding = true;
                } else {
                    self.rx_abort_pending = false;
                }
            }
        }

        if !outstanding {
            self.previous_state = State::Abort;
            self.set_state(State::Idle);
            self.last_error_codes = ErrorCodes::NONE;
            self.notify(self.callbacks.abort_complete);
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // DMA events

    /// Feed an event from the Tx DMA channel, from its interrupt
    /// handler.
    pub fn dma_tx_event(&mut self, event: DmaEvent) {
        match event {
            DmaEvent::TransferComplete => {
                // All bytes are queued; TXMSGSENT reports the message on
                // the wire
                self.ucpd.imr().modify(|_, w| w.txmsgsentie().set_bit());
                self.ucpd.cfgr1().modify(|_, w| w.txdmaen().clear_bit());
            }
            DmaEvent::Error => self.dma_transfer_error(true),
            DmaEvent::AbortComplete => self.tx_dma_abort_complete(),
        }
    }

    /// Feed an event from the Rx DMA channel, from its interrupt
    /// handler.
    pub fn dma_rx_event(&mut self, event: DmaEvent) {
        match event {
            DmaEvent::TransferComplete => {
                self.ucpd.cfgr1().modify(|_, w| w.rxdmaen().clear_bit());
                self.set_state(State::Idle);
            }
            DmaEvent::Error => self.dma_transfer_error(false),
            DmaEvent::AbortComplete => self.rx_dma_abort_complete(),
        }
    }

    fn tx_dma_abort_complete(&mut self) {
        match self.tx_abort_reason {
            Some(TxAbortReason::UserAbort) => {
                self.clear_tx_flags_disable_dma();
                // The abort resolves on the TXMSGSENT interrupt
            }
            Some(TxAbortReason::GoodCrcRelease) => {
                self.clear_tx_flags_disable_dma();
                self.tx_abort_reason = None;
            }
            Some(TxAbortReason::MsgDiscard) => {
                self.end_tx_message_abort();
                self.tx_abort_reason = None;
                self.notify(self.callbacks.tx_discarded);
            }
            Some(TxAbortReason::MsgAbort) => {
                self.end_tx_message_abort();
                self.tx_abort_reason = None;
                self.notify(self.callbacks.tx_aborted);
            }
            None => {}
        }
    }

    fn rx_dma_abort_complete(&mut self) {
        self.rx_abort_pending = false;

        // Completion is owed by whichever side finishes last
        if self.tx_abort_reason == Some(TxAbortReason::UserAbort) {
            return;
        }

        self.ucpd.icr().write(|w| w.rxovrcf().set_bit());
        self.ucpd.cfgr1().modify(|_, w| w.rxdmaen().clear_bit());

        self.previous_state = State::Idle;
        self.set_state(State::Idle);
        self.last_error_codes = ErrorCodes::NONE;

        self.notify(self.callbacks.abort_complete);
    }

    fn clear_tx_flags_disable_dma(&mut self) {
        // Flags raised while the aborted message was in flight
        self.ucpd.icr().write(|w| {
            w.txundcf()
                .set_bit()
                .hrstdisccf()
                .set_bit()
                .txmsgabtcf()
                .set_bit()
                .txmsgdisccf()
                .set_bit()
        });
        self.ucpd.cfgr1().modify(|_, w| w.txdmaen().clear_bit());
    }

    fn end_tx_message_abort(&mut self) {
        self.ucpd.imr().modify(|_, w| {
            w.txundie()
                .clear_bit()
                .txmsgabtie()
                .clear_bit()
                .txmsgsentie()
                .clear_bit()
                .txmsgdiscie()
                .clear_bit()
        });
        self.swap_restore_state();
    }

    fn dma_transfer_error(&mut self, tx: bool) {
        if tx
            && self.state() == State::Tx
            && self.ucpd.cfgr1().read().txdmaen().bit_is_set()
        {
            self.end_tx_transfer();
            self.last_error_codes |= ErrorCodes::DMA;
        }
        if !tx
            && self.state() == State::Rx
            && self.ucpd.cfgr1().read().rxdmaen().bit_is_set()
        {
            self.end_rx_transfer();
            self.last_error_codes |= ErrorCodes::DMA;
        }

        self.swap_restore_state();
        self.notify(self.callbacks.error);
    }

    fn end_tx_transfer(&mut self) {
        self.ucpd.imr().modify(|_, w| {
            w.txundie()
                .clear_bit()
                .hrstsentie()
                .clear_bit()
                .hrstdiscie()
                .clear_bit()
                .txmsgabtie()
                .clear_bit()
                .txmsgsentie()
                .clear_bit()
                .txmsgdiscie()
                .clear_bit()
        });
        self.previous_state = self.state();
        self.set_state(State::Idle);
    }

    fn end_rx_transfer(&mut self) {
        self.ucpd.imr().modify(|_, w| {
            w.rxmsgendie()
                .clear_bit()
                .rxovrie()
                .clear_bit()
                .rxhrstdetie()
                .clear_bit()
                .rxorddetie()
                .clear_bit()
        });
        self.previous_state = self.state();
        self.set_state(State::Idle);
    }

    // ------------------------------------------------------------------
    // Interrupt handling

    /// Handle a UCPD interrupt. Call from the peripheral's interrupt
    /// handler.
    pub fn irq_handler(&mut self) {
        let sr = self.ucpd.sr().read().bits();
        let imr = self.ucpd.imr().read().bits();

        // RXERR has no interrupt enable of its own, it qualifies
        // RXMSGEND
        let active = sr & (imr | SR_RXERR);
        if active == 0 {
            return;
        }

        // Tx underrun
        if active & SR_TXUND != 0 {
            self.last_error_codes |= ErrorCodes::TX_UNDERRUN;

            self.ucpd.imr().modify(|_, w| w.txundie().clear_bit());
            self.ucpd.icr().write(|w| w.txundcf().set_bit());

            // An erroneous message still goes out; TXMSGSENT marks the
            // end of the underrun
            self.ucpd.imr().modify(|_, w| w.txmsgsentie().set_bit());
        }

        // Rx overrun
        if active & SR_RXOVR != 0 {
            self.last_error_codes |= ErrorCodes::RX_OVERRUN;
            self.ucpd.icr().write(|w| w.rxovrcf().set_bit());
        }

        // Rx message end
        if active & SR_RXMSGEND != 0 {
            self.ucpd.icr().write(|w| w.rxmsgendcf().set_bit());

            if active & SR_RXERR != 0 {
                self.last_error_codes |= ErrorCodes::RX_ERROR;
            } else {
                self.notify(self.callbacks.rx_complete);

                if TXDMA::BOUND {
                    if self.ucpd.cfgr1().read().txdmaen().bit_is_set() {
                        // GoodCRC armed by set_goodcrc_data(); send it
                        self.ucpd
                            .tx_payszr()
                            .write(|w| w.txpaysz().set(GOODCRC_SIZE));
                        self.ucpd.cr().modify(|_, w| w.txsend().set_bit());
                    } else {
                        // No reply armed; release the pre-armed channel
                        self.tx_abort_reason =
                            Some(TxAbortReason::GoodCrcRelease);
                        if self.tx_dma.abort_async().is_err() {
                            self.last_error_codes |= ErrorCodes::DMA;
                            self.tx_dma_abort_complete();
                        }
                    }
                }
            }
        }

        // Tx message discarded
        if active & SR_TXMSGDISC != 0 {
            self.ucpd.icr().write(|w| w.txmsgdisccf().set_bit());

            if TXDMA::BOUND {
                self.tx_abort_reason = Some(TxAbortReason::MsgDiscard);
                if self.tx_dma.abort_async().is_err() {
                    self.last_error_codes |= ErrorCodes::DMA;
                    self.tx_dma_abort_complete();
                }
            }
        }

        // Tx message sent
        if active & SR_TXMSGSENT != 0 {
            self.ucpd.icr().write(|w| w.txmsgsentcf().set_bit());

            match self.state() {
                State::Abort => {
                    self.ucpd.icr().write(|w| w.txundcf().set_bit());

                    self.previous_state = State::Abort;
                    self.set_state(State::Idle);
                    self.last_error_codes = ErrorCodes::NONE;
                    self.tx_abort_reason = None;

                    if !self.rx_abort_pending {
                        self.notify(self.callbacks.abort_complete);
                    }
                }
                State::Rx => {
                    // End of the GoodCRC reply
                    let previous = self.previous_state;
                    self.previous_state = State::Rx;
                    self.set_state(previous);

                    self.notify(self.callbacks.goodcrc_sent);
                }
                _ => {
                    // TXMSGSENT marks the end of a possible underrun
                    self.ucpd.icr().write(|w| w.txundcf().set_bit());
                    self.ucpd.cr().modify(|_, w| unsafe {
                        w.txmode().bits(TxMode::Normal as u8)
                    });

                    self.swap_restore_state();
                    self.notify(self.callbacks.tx_complete);
                }
            }
        }

        // Tx message aborted
        if active & SR_TXMSGABT != 0 {
            self.ucpd.icr().write(|w| w.txmsgabtcf().set_bit());

            if TXDMA::BOUND {
                self.tx_abort_reason = Some(TxAbortReason::MsgAbort);
                if self.tx_dma.abort_async().is_err() {
                    self.last_error_codes |= ErrorCodes::DMA;
                    self.tx_dma_abort_complete();
                }
            }
        }

        // Hard reset discarded
        if active & SR_HRSTDISC != 0 {
            self.ucpd.icr().write(|w| w.hrstdisccf().set_bit());
            self.notify(self.callbacks.hard_reset_discarded);
        }

        // Hard reset sent
        if active & SR_HRSTSENT != 0 {
            self.ucpd.icr().write(|w| w.hrstsentcf().set_bit());
            self.notify(self.callbacks.hard_reset_sent);
        }

        // Rx ordered set detected
        if active & SR_RXORDDET != 0 {
            self.ucpd.icr().write(|w| w.rxorddetcf().set_bit());
            self.notify(self.callbacks.rx_ordered_set);
        }

        // Rx hard reset detected
        if active & SR_RXHRSTDET != 0 {
            self.ucpd.icr().write(|w| w.rxhrstdetcf().set_bit());
            self.notify(self.callbacks.hard_reset_received);
        }

        // Type-C voltage events
        if active & (SR_TYPECEVT1 | SR_TYPECEVT2) != 0 {
            let event = match (
                active & SR_TYPECEVT1 != 0,
                active & SR_TYPECEVT2 != 0,
            ) {
                (true, true) => CcEvent::Cc1Cc2,
                (true, false) => CcEvent::Cc1,
                _ => CcEvent::Cc2,
            };

            self.ucpd
                .icr()
                .write(|w| w.typecevt1cf().set_bit().typecevt2cf().set_bit());

            if let Some(cb) = self.callbacks.type_c_event {
                cb(self, event);
            }
        }

        // Fast Role Swap received
        if active & SR_FRSEVT != 0 {
            self.ucpd.icr().write(|w| w.frsevtcf().set_bit());
            self.notify(self.callbacks.frs_received);
        }

        if !self.last_error_codes.is_empty() {
            self.notify(self.callbacks.error);
        }

        interrupt_clear_clock_sync_delay!(self.ucpd.sr());
    }

    fn notify(&mut self, callback: Option<Callback<UCPD, TXDMA, RXDMA>>) {
        if let Some(cb) = callback {
            cb(self);
        }
    }
}

fn trimming_applicable() -> bool {
    let idcode = unsafe { (*crate::stm32::DBGMCU::ptr()).idcode().read() };
    let dev_id = idcode.dev_id().bits();
    let rev_id = idcode.rev_id().bits();

    matches!(
        (dev_id, rev_id),
        (0x482, 0x3000)
            | (0x481, 0x2001)
            | (0x481, 0x3000)
            | (0x481, 0x3001)
            | (0x476, 0x1000)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    // Register file backing the fake peripheral. The heap allocation
    // keeps the register addresses stable while the driver moves.
    struct FakeUcpd {
        regs: Box<[u32; 16]>,
    }

    impl FakeUcpd {
        fn new() -> Self {
            FakeUcpd {
                regs: Box::new([0; 16]),
            }
        }
    }

    impl Deref for FakeUcpd {
        type Target = ucpd1::RegisterBlock;

        fn deref(&self) -> &Self::Target {
            unsafe {
                &*(self.regs.as_ptr() as *const ucpd1::RegisterBlock)
            }
        }
    }

    impl crate::Sealed for FakeUcpd {}

    impl Instance for FakeUcpd {
        type Rec = FakeRec;

        fn rec() -> FakeRec {
            FakeRec
        }

        fn disable_dead_battery(&self) {}
    }

    struct FakeRec;

    impl ResetEnable for FakeRec {
        fn enable(self) -> Self {
            self
        }
        fn disable(self) -> Self {
            self
        }
        fn reset(self) -> Self {
            self
        }
    }

    #[derive(Default)]
    struct FakeDma {
        started: Vec<(u32, u32, u16)>,
        fail_start: bool,
        fail_abort: bool,
        active: bool,
        async_aborts: usize,
    }

    impl DmaChannel for FakeDma {
        unsafe fn start_periph_transfer(
            &mut self,
            src: u32,
            dst: u32,
            len_bytes: u16,
        ) -> Result<(), DmaError> {
            if self.fail_start {
                return Err(DmaError);
            }
            self.started.push((src, dst, len_bytes));
            self.active = true;
            Ok(())
        }

        fn abort(&mut self) -> Result<(), DmaError> {
            self.active = false;
            Ok(())
        }

        fn abort_async(&mut self) -> Result<(), DmaError> {
            if self.fail_abort {
                return Err(DmaError);
            }
            self.async_aborts += 1;
            self.active = false;
            Ok(())
        }

        fn is_active(&self) -> bool {
            self.active
        }
    }

    type TestUcpd = Ucpd<FakeUcpd, FakeDma, FakeDma>;

    fn new_ucpd() -> TestUcpd {
        FakeUcpd::new()
            .ucpd(Config::new(), FakeRec)
            .unwrap()
            .with_tx_dma(FakeDma::default())
            .with_rx_dma(FakeDma::default())
    }

    fn set_sr(u: &TestUcpd, bits: u32) {
        unsafe { core::ptr::write_volatile(u.ucpd.sr().as_ptr(), bits) };
    }

    #[test]
    fn config_rejects_out_of_range() {
        assert!(FakeUcpd::new()
            .ucpd(Config::new().half_bit_clock_divider(0), FakeRec)
            .is_err());
        assert!(FakeUcpd::new()
            .ucpd(Config::new().half_bit_clock_divider(65), FakeRec)
            .is_err());
        assert!(FakeUcpd::new()
            .ucpd(Config::new().transition_window_divider(1), FakeRec)
            .is_err());
        assert!(FakeUcpd::new()
            .ucpd(Config::new().inter_frame_gap_divider(33), FakeRec)
            .is_err());

        let mut u = new_ucpd();
        assert_eq!(
            u.apply_config(Config::new().transition_window_divider(33)),
            Err(Error::InvalidParam)
        );
    }

    #[test]
    fn config_register_encoding() {
        let config = Config::new()
            .clock_prescaler(ClockPrescaler::Div2)
            .half_bit_clock_divider(27)
            .transition_window_divider(9)
            .inter_frame_gap_divider(16)
            .rx_ordered_sets(
                RxOrderedSets::SOP
                    | RxOrderedSets::SOP1
                    | RxOrderedSets::HARD_RESET,
            );

        let u = FakeUcpd::new().ucpd(config, FakeRec).unwrap();

        let cfgr1 = u.ucpd.cfgr1().read();
        assert_eq!(cfgr1.psc_usbpdclk().bits(), 1);
        assert_eq!(cfgr1.hbitclkdiv().bits(), 26);
        assert_eq!(cfgr1.transwin().bits(), 8);
        assert_eq!(cfgr1.ifrgap().bits(), 15);
        assert!(cfgr1.rxordseten0().bit_is_set());
        assert!(cfgr1.rxordseten1().bit_is_set());
        assert!(cfgr1.rxordseten2().bit_is_clear());
        assert!(cfgr1.rxordseten3().bit_is_set());
        assert!(cfgr1.rxordseten4().bit_is_clear());
        assert!(cfgr1.rxordseten8().bit_is_clear());

        let read_back = u.get_config();
        assert_eq!(read_back.clock_prescaler, ClockPrescaler::Div2);
        assert_eq!(read_back.half_bit_clock_divider, 27);
        assert_eq!(read_back.transition_window_divider, 9);
        assert_eq!(read_back.inter_frame_gap_divider, 16);
        assert_eq!(read_back.rx_ordered_sets.bits(), 0b0_0000_1011);
    }

    #[test]
    fn start_stop_gates() {
        let mut u = new_ucpd();
        assert_eq!(u.state(), State::Configured);

        let buf: &'static [u8] = Box::leak(Box::new([0u8; 4]));
        assert_eq!(u.transmit_dma(buf), Err(Error::Busy));
        assert_eq!(u.send_hard_reset(), Err(Error::Busy));
        assert_eq!(u.abort(), Err(Error::Busy));

        u.start().unwrap();
        assert_eq!(u.state(), State::Idle);
        assert!(u.ucpd.cfgr1().read().ucpden().bit_is_set());

        assert_eq!(u.start(), Err(Error::Busy));
        assert_eq!(u.apply_config(Config::new()), Err(Error::Busy));
        assert_eq!(
            u.set_rx_ordered_sets(RxOrderedSets::SOP),
            Err(Error::Busy)
        );

        u.stop().unwrap();
        assert_eq!(u.state(), State::Configured);
        assert!(u.ucpd.cfgr1().read().ucpden().bit_is_clear());
        assert_eq!(u.stop(), Err(Error::Busy));
    }

    #[test]
    fn transmit_flow() {
        static TX_DONE: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            tx_complete: Some(|_| {
                TX_DONE.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();

        let buf: &'static [u8] = Box::leak(Box::new([0x41u8, 0x01, 0xAA, 0xBB]));
        u.transmit_dma(buf).unwrap();

        assert_eq!(u.state(), State::Tx);
        assert_eq!(u.previous_state(), State::Idle);
        assert_eq!(
            u.tx_dma.started,
            vec![(
                buf.as_ptr() as u32,
                u.ucpd.txdr().as_ptr() as u32,
                4
            )]
        );
        assert!(u.ucpd.cfgr1().read().txdmaen().bit_is_set());
        let imr = u.ucpd.imr().read();
        assert!(imr.txmsgdiscie().bit_is_set());
        assert!(imr.txmsgabtie().bit_is_set());
        assert!(imr.txundie().bit_is_set());
        assert_eq!(u.ucpd.tx_payszr().read().txpaysz().bits(), 4);
        assert!(u.ucpd.cr().read().txsend().bit_is_set());

        // Another transfer is refused while this one runs
        assert_eq!(u.transmit_dma(buf), Err(Error::Busy));

        u.dma_tx_event(DmaEvent::TransferComplete);
        assert!(u.ucpd.imr().read().txmsgsentie().bit_is_set());
        assert!(u.ucpd.cfgr1().read().txdmaen().bit_is_clear());

        set_sr(&u, SR_TXMSGSENT);
        u.irq_handler();

        assert_eq!(TX_DONE.load(Ordering::Relaxed), 1);
        assert_eq!(u.state(), State::Idle);
        assert_eq!(u.previous_state(), State::Tx);
        assert_eq!(u.ucpd.cr().read().txmode().bits(), 0);
    }

    #[test]
    fn transmit_rejects_invalid_sizes() {
        let mut u = new_ucpd();
        u.start().unwrap();

        let short: &'static [u8] = Box::leak(Box::new([0u8; 1]));
        assert_eq!(u.transmit_dma(short), Err(Error::InvalidParam));

        let long: &'static [u8] = Box::leak(vec![0u8; 0x400].into_boxed_slice());
        assert_eq!(u.transmit_dma(long), Err(Error::InvalidParam));

        let rx_short: &'static mut [u8] = Box::leak(Box::new([0u8; 1]));
        assert_eq!(u.receive_dma(rx_short), Err(Error::InvalidParam));

        assert_eq!(u.state(), State::Idle);
        assert!(u.tx_dma.started.is_empty());
        assert!(u.rx_dma.started.is_empty());

        // A bare header is the smallest valid message
        let min: &'static [u8] = Box::leak(Box::new([0u8; 2]));
        assert!(u.transmit_dma(min).is_ok());
    }

    #[test]
    fn transmit_dma_start_failure_restores_state() {
        let mut u = new_ucpd();
        u.start().unwrap();
        u.tx_dma.fail_start = true;

        let buf: &'static [u8] = Box::leak(Box::new([0u8; 4]));
        assert_eq!(u.transmit_dma(buf), Err(Error::Dma(DmaError)));
        assert_eq!(u.state(), State::Idle);
        assert!(u.last_error_codes().contains(ErrorCodes::DMA));
        assert!(u.ucpd.cfgr1().read().txdmaen().bit_is_clear());
    }

    #[test]
    fn receive_with_goodcrc_reply() {
        static RX_DONE: AtomicUsize = AtomicUsize::new(0);
        static CRC_SENT: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            rx_complete: Some(|_| {
                RX_DONE.fetch_add(1, Ordering::Relaxed);
            }),
            goodcrc_sent: Some(|_| {
                CRC_SENT.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();

        u.set_goodcrc_data(0x0F01).unwrap();
        assert_eq!(u.goodcrc, [0x01, 0x0F]);

        let buf: &'static mut [u8] = Box::leak(Box::new([0u8; 30]));
        let buf_addr = buf.as_ptr() as u32;
        u.receive_dma(buf).unwrap();

        assert_eq!(u.state(), State::Rx);
        assert_eq!(
            u.rx_dma.started,
            vec![(u.ucpd.rxdr().as_ptr() as u32, buf_addr, 30)]
        );
        // The reply is pre-armed from the stored header
        assert_eq!(
            u.tx_dma.started,
            vec![(
                u.goodcrc.as_ptr() as u32,
                u.ucpd.txdr().as_ptr() as u32,
                2
            )]
        );
        assert!(u.ucpd.cfgr1().read().rxdmaen().bit_is_set());
        assert!(u.ucpd.cfgr1().read().txdmaen().bit_is_set());
        assert!(u.ucpd.cr().read().phyrxen().bit_is_set());
        let imr = u.ucpd.imr().read();
        assert!(imr.rxovrie().bit_is_set());
        assert!(imr.rxmsgendie().bit_is_set());
        assert!(imr.txmsgdiscie().bit_is_set());

        set_sr(&u, SR_RXMSGEND);
        u.irq_handler();

        assert_eq!(RX_DONE.load(Ordering::Relaxed), 1);
        assert_eq!(u.ucpd.tx_payszr().read().txpaysz().bits(), 2);
        assert!(u.ucpd.cr().read().txsend().bit_is_set());

        u.dma_tx_event(DmaEvent::TransferComplete);
        set_sr(&u, SR_TXMSGSENT);
        u.irq_handler();

        assert_eq!(CRC_SENT.load(Ordering::Relaxed), 1);
        assert_eq!(u.state(), State::Idle);
        assert_eq!(u.previous_state(), State::Rx);
    }

    #[test]
    fn receive_without_goodcrc_releases_tx_channel() {
        static ABORTED: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            abort_complete: Some(|_| {
                ABORTED.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();

        let buf: &'static mut [u8] = Box::leak(Box::new([0u8; 30]));
        u.receive_dma(buf).unwrap();
        assert!(u.ucpd.cfgr1().read().txdmaen().bit_is_clear());

        set_sr(&u, SR_RXMSGEND);
        u.irq_handler();

        assert_eq!(u.tx_abort_reason, Some(TxAbortReason::GoodCrcRelease));
        assert_eq!(u.tx_dma.async_aborts, 1);

        u.dma_tx_event(DmaEvent::AbortComplete);
        assert_eq!(u.tx_abort_reason, None);

        // Releasing the pre-armed channel is not a user abort
        assert_eq!(ABORTED.load(Ordering::Relaxed), 0);
        assert_eq!(u.state(), State::Rx);
    }

    #[test]
    fn rx_error_keeps_reply_armed() {
        static RX_DONE: AtomicUsize = AtomicUsize::new(0);
        static ERRORS: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            rx_complete: Some(|_| {
                RX_DONE.fetch_add(1, Ordering::Relaxed);
            }),
            error: Some(|_| {
                ERRORS.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();

        u.set_goodcrc_data(0x0F01).unwrap();
        let buf: &'static mut [u8] = Box::leak(Box::new([0u8; 30]));
        u.receive_dma(buf).unwrap();

        set_sr(&u, SR_RXMSGEND | SR_RXERR);
        u.irq_handler();

        // The corrupt message gets no completion and no reply
        assert_eq!(RX_DONE.load(Ordering::Relaxed), 0);
        assert_eq!(ERRORS.load(Ordering::Relaxed), 1);
        assert!(u.last_error_codes().contains(ErrorCodes::RX_ERROR));
        assert!(u.ucpd.cr().read().txsend().bit_is_clear());
        assert!(u.ucpd.cfgr1().read().txdmaen().bit_is_set());
    }

    #[test]
    fn abort_completes_once_tx_side_last() {
        static ABORTED: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            abort_complete: Some(|_| {
                ABORTED.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();
        u.set_goodcrc_data(0x0F01).unwrap();
        let buf: &'static mut [u8] = Box::leak(Box::new([0u8; 30]));
        u.receive_dma(buf).unwrap();

        u.abort().unwrap();
        assert_eq!(u.state(), State::Abort);
        assert_eq!(ABORTED.load(Ordering::Relaxed), 0);

        u.dma_rx_event(DmaEvent::AbortComplete);
        assert_eq!(ABORTED.load(Ordering::Relaxed), 0);

        u.dma_tx_event(DmaEvent::AbortComplete);
        set_sr(&u, SR_TXMSGSENT);
        u.irq_handler();

        assert_eq!(ABORTED.load(Ordering::Relaxed), 1);
        assert_eq!(u.state(), State::Idle);
        assert!(u.last_error_codes().is_empty());
    }

    #[test]
    fn abort_completes_once_rx_side_last() {
        static ABORTED: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            abort_complete: Some(|_| {
                ABORTED.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();
        u.set_goodcrc_data(0x0F01).unwrap();
        let buf: &'static mut [u8] = Box::leak(Box::new([0u8; 30]));
        u.receive_dma(buf).unwrap();

        u.abort().unwrap();

        u.dma_tx_event(DmaEvent::AbortComplete);
        set_sr(&u, SR_TXMSGSENT);
        u.irq_handler();
        // Rx abort still outstanding
        assert_eq!(ABORTED.load(Ordering::Relaxed), 0);

        u.dma_rx_event(DmaEvent::AbortComplete);
        assert_eq!(ABORTED.load(Ordering::Relaxed), 1);
        assert_eq!(u.state(), State::Idle);
    }

    #[test]
    fn abort_mid_transmit_completes_once() {
        static ABORTED: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            abort_complete: Some(|_| {
                ABORTED.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();

        let buf: &'static [u8] = Box::leak(Box::new([0u8; 8]));
        u.transmit_dma(buf).unwrap();

        u.abort().unwrap();
        assert_eq!(u.state(), State::Abort);
        assert_eq!(ABORTED.load(Ordering::Relaxed), 0);
        assert!(u.ucpd.cfgr1().read().txdmaen().bit_is_clear());

        u.dma_tx_event(DmaEvent::AbortComplete);
        assert_eq!(ABORTED.load(Ordering::Relaxed), 0);

        set_sr(&u, SR_TXMSGSENT);
        u.irq_handler();

        assert_eq!(ABORTED.load(Ordering::Relaxed), 1);
        assert_eq!(u.state(), State::Idle);

        // A stray TXMSGSENT after the abort resolved must not retrigger
        set_sr(&u, SR_TXMSGSENT);
        u.irq_handler();
        assert_eq!(ABORTED.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn abort_without_active_dma_completes_synchronously() {
        static ABORTED: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            abort_complete: Some(|_| {
                ABORTED.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();

        u.abort().unwrap();
        assert_eq!(ABORTED.load(Ordering::Relaxed), 1);
        assert_eq!(u.state(), State::Idle);
        assert_eq!(u.previous_state(), State::Abort);
        assert!(u.ucpd.imr().read().txmsgsentie().bit_is_set());
    }

    #[test]
    fn tx_underrun_reports_error() {
        static ERRORS: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            error: Some(|_| {
                ERRORS.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();

        let buf: &'static [u8] = Box::leak(Box::new([0u8; 4]));
        u.transmit_dma(buf).unwrap();

        set_sr(&u, SR_TXUND);
        u.irq_handler();

        assert_eq!(ERRORS.load(Ordering::Relaxed), 1);
        assert!(u.last_error_codes().contains(ErrorCodes::TX_UNDERRUN));
        let imr = u.ucpd.imr().read();
        assert!(imr.txundie().bit_is_clear());
        assert!(imr.txmsgsentie().bit_is_set());
    }

    #[test]
    fn tx_message_discard_flow() {
        static DISCARDED: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            tx_discarded: Some(|_| {
                DISCARDED.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();

        let buf: &'static [u8] = Box::leak(Box::new([0u8; 4]));
        u.transmit_dma(buf).unwrap();

        set_sr(&u, SR_TXMSGDISC);
        u.irq_handler();
        assert_eq!(u.tx_dma.async_aborts, 1);
        assert_eq!(DISCARDED.load(Ordering::Relaxed), 0);

        u.dma_tx_event(DmaEvent::AbortComplete);
        assert_eq!(DISCARDED.load(Ordering::Relaxed), 1);
        assert_eq!(u.state(), State::Idle);
        assert_eq!(u.previous_state(), State::Tx);
        let imr = u.ucpd.imr().read();
        assert!(imr.txmsgdiscie().bit_is_clear());
        assert!(imr.txmsgabtie().bit_is_clear());
        assert!(imr.txundie().bit_is_clear());
    }

    #[test]
    fn tx_dma_error_reports_error() {
        static ERRORS: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            error: Some(|_| {
                ERRORS.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();

        let buf: &'static [u8] = Box::leak(Box::new([0u8; 4]));
        u.transmit_dma(buf).unwrap();

        u.dma_tx_event(DmaEvent::Error);

        assert_eq!(ERRORS.load(Ordering::Relaxed), 1);
        assert!(u.last_error_codes().contains(ErrorCodes::DMA));
        let imr = u.ucpd.imr().read();
        assert!(imr.txundie().bit_is_clear());
        assert!(imr.txmsgdiscie().bit_is_clear());

        // The handle stays in Tx after a Tx DMA error; recovery goes
        // through abort() or stop()
        assert_eq!(u.state(), State::Tx);
        assert_eq!(u.transmit_dma(buf), Err(Error::Busy));
        u.stop().unwrap();
        assert_eq!(u.state(), State::Configured);
    }

    #[test]
    fn type_c_events_resolve_lines() {
        static LAST: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            type_c_event: Some(|_, event| {
                let code = match event {
                    CcEvent::Cc1 => 1,
                    CcEvent::Cc2 => 2,
                    CcEvent::Cc1Cc2 => 3,
                };
                LAST.store(code, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();
        u.enable_type_c_detector(CcLine::Cc1);
        u.enable_type_c_detector(CcLine::Cc2);

        set_sr(&u, SR_TYPECEVT1 | SR_TYPECEVT2);
        u.irq_handler();
        assert_eq!(LAST.load(Ordering::Relaxed), 3);

        set_sr(&u, SR_TYPECEVT2);
        u.irq_handler();
        assert_eq!(LAST.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn voltage_level_follows_role() {
        let mut u = new_ucpd();
        u.start().unwrap();

        // vstate CC1 = 1, CC2 = 3
        set_sr(&u, (1 << 16) | (3 << 18));

        u.set_role(Role::Source);
        assert_eq!(u.type_c_voltage_level(CcLine::Cc1), VoltageState::SrcRd);
        assert_eq!(
            u.type_c_voltage_level(CcLine::Cc2),
            VoltageState::SrcInvalid
        );

        u.set_role(Role::Sink);
        assert_eq!(
            u.type_c_voltage_level(CcLine::Cc1),
            VoltageState::SnkRpDefault
        );
        assert_eq!(
            u.type_c_voltage_level(CcLine::Cc2),
            VoltageState::SnkRp3_0A
        );
    }

    #[test]
    fn masked_flags_are_ignored() {
        static HITS: AtomicUsize = AtomicUsize::new(0);

        let mut u = new_ucpd();
        u.set_callbacks(Callbacks {
            rx_ordered_set: Some(|_| {
                HITS.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        })
        .unwrap();
        u.start().unwrap();

        // RXORDDET pending but not enabled in IMR
        set_sr(&u, SR_RXORDDET);
        u.irq_handler();
        assert_eq!(HITS.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn tx_ordered_set_encoding() {
        assert_eq!(TxOrderedSet::Sop.k_codes(), 0x8E318);
        assert_eq!(TxOrderedSet::HardReset.k_codes(), 0xC9CE7);

        let mut u = new_ucpd();
        u.set_tx_ordered_set(TxOrderedSet::Sop);
        assert_eq!(u.ucpd.tx_ordsetr().read().txordset().bits(), 0x8E318);
    }

    #[test]
    fn bus_lock_is_exclusive() {
        let u = new_ucpd();
        assert!(u.try_acquire_bus());
        assert!(!u.try_acquire_bus());
        u.release_bus();
        assert!(u.try_acquire_bus());
    }
}
