//! DMA collaborator boundary for the UCPD driver
//!
//! The UCPD peripheral moves message payloads with one DMA channel per
//! direction. The driver does not own a DMA implementation: it drives any
//! channel through the [`DmaChannel`] trait and receives the channel's
//! asynchronous events back through [`Ucpd::dma_tx_event`] and
//! [`Ucpd::dma_rx_event`], which the integrator calls from the DMA
//! interrupt handler.
//!
//! [`Ucpd::dma_tx_event`]: super::Ucpd::dma_tx_event
//! [`Ucpd::dma_rx_event`]: super::Ucpd::dma_rx_event

/// Error reported by a DMA channel when a transfer cannot be started or
/// aborted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct DmaError;

/// Asynchronous event reported by a DMA channel.
///
/// Forward these from the DMA interrupt handler to
/// [`Ucpd::dma_tx_event`](super::Ucpd::dma_tx_event) or
/// [`Ucpd::dma_rx_event`](super::Ucpd::dma_rx_event) for the channel bound
/// to that direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaEvent {
    /// The programmed transfer completed.
    TransferComplete,
    /// The channel detected a transfer error.
    Error,
    /// An abort requested with [`DmaChannel::abort_async`] completed.
    AbortComplete,
}

/// A DMA channel that can serve the UCPD data registers.
///
/// Transfers are peripheral-flow-controlled: the channel moves single
/// bytes on the UCPD Tx/Rx DMA request lines. After
/// [`start_periph_transfer`](Self::start_periph_transfer) returns the
/// channel owns the given addresses until it signals
/// [`DmaEvent::TransferComplete`], [`DmaEvent::Error`] or the completion
/// of an abort.
pub trait DmaChannel {
    /// Whether this type represents a real channel. [`NoDma`] is the only
    /// implementation where this is `false`.
    const BOUND: bool = true;

    /// Start a peripheral transfer of `len_bytes` bytes between `src` and
    /// `dst`. One of the two addresses is a UCPD data register, the other
    /// a memory buffer.
    ///
    /// # Safety
    ///
    /// Both addresses must stay valid for the duration of the transfer.
    unsafe fn start_periph_transfer(
        &mut self,
        src: u32,
        dst: u32,
        len_bytes: u16,
    ) -> Result<(), DmaError>;

    /// Abort the channel and block until it is stopped. Used on the
    /// teardown path only.
    fn abort(&mut self) -> Result<(), DmaError>;

    /// Request an asynchronous abort. Completion is signalled by a later
    /// [`DmaEvent::AbortComplete`].
    fn abort_async(&mut self) -> Result<(), DmaError>;

    /// Whether the channel currently has a transfer (or abort) in flight.
    fn is_active(&self) -> bool;
}

/// Placeholder for an unbound DMA direction.
///
/// A `Ucpd<_, NoDma, NoDma>` can still perform configuration, control and
/// Type-C detection; the DMA transfer entry points return
/// [`Error::NotBound`](super::Error::NotBound).
pub struct NoDma;

impl DmaChannel for NoDma {
    const BOUND: bool = false;

    unsafe fn start_periph_transfer(
        &mut self,
        _src: u32,
        _dst: u32,
        _len_bytes: u16,
    ) -> Result<(), DmaError> {
        Err(DmaError)
    }

    fn abort(&mut self) -> Result<(), DmaError> {
        Ok(())
    }

    fn abort_async(&mut self) -> Result<(), DmaError> {
        Err(DmaError)
    }

    fn is_active(&self) -> bool {
        false
    }
}
