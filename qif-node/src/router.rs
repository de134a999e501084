//! Frame routing
//!
//! Every received frame goes through the same steps:
//!
//! 1. The filter table decides whether the frame is processed at all. Filter updates on the
//!    service channel always pass, so a misconfigured table can still be repaired.
//! 2. The destination address is looked up in the registry.
//! 3. Frames on the service channel are handled by the router itself, then passed to the
//!    application's [`ServiceHandler`].
//! 4. Frames for undefined boards are dropped.
//! 5. The handler of the addressed slot runs. If it produces a payload and the slot is linked,
//!    the payload is sent to the link target.
use defmt_or_log::{debug, info, warn};
use qif_common::{
    board::{BoardType, BusAddress, HandlerId},
    constants::{OFFSET_MASK, SVR},
    messages::{CanId, CanMessage, FilterType, FilterUpdate, SensorReport, Service},
};

use crate::{
    filter::{Decision, FilterError, FilterTable},
    handlers::{FrameContext, HandlerTable},
    registry::Registry,
};

/// Why a frame was not delivered
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The filter table denied the destination
    Filtered,
    /// The frame carried an extended identifier
    InvalidAddress,
    /// No board owns the destination
    UnknownAddress,
    /// The destination board is not installed
    InactiveBoard,
    /// A filter update named a slot beyond the end of the table
    FilterSlotOutOfRange,
    /// A service frame could not be decoded
    MalformedService,
}

/// What happened to a routed frame
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoutingOutcome {
    /// The slot handler ran
    Delivered {
        /// Handler which ran
        handler: HandlerId,
        /// Link target the handler's output was sent to
        forwarded_to: Option<BusAddress>,
    },
    /// The frame was handled on the service channel
    Service(Service),
    /// The frame was dropped
    Dropped(DropReason),
}

/// Application hooks for the service channel
pub trait ServiceHandler {
    /// Called for every admitted service frame, after the router's own handling
    fn handle_service(&mut self, service: Service, frame: &CanMessage);

    /// Called for every decoded sensor broadcast
    fn handle_sensor(&mut self, service: Service, report: SensorReport) {
        let _ = (service, report);
    }
}

/// Routes frames to handlers and links
#[allow(missing_debug_implementations)]
pub struct Router<'a> {
    registry: &'a Registry,
    filters: FilterTable,
    handlers: HandlerTable<'a>,
    services: Option<&'a mut dyn ServiceHandler>,
}

impl<'a> Router<'a> {
    /// Create a router with an open filter table
    pub fn new(registry: &'a Registry, handlers: HandlerTable<'a>) -> Self {
        Self {
            registry,
            filters: FilterTable::new(),
            handlers,
            services: None,
        }
    }

    /// Attach the application's service handler
    pub fn with_service_handler(mut self, services: &'a mut dyn ServiceHandler) -> Self {
        self.services = Some(services);
        self
    }

    /// Start from a pre-configured filter table
    pub fn with_filters(mut self, filters: FilterTable) -> Self {
        self.filters = filters;
        self
    }

    /// The registry frames are routed against
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// The current filter table
    pub fn filters(&self) -> &FilterTable {
        &self.filters
    }

    /// Overwrite one slot of the filter table
    pub fn update_filter(
        &mut self,
        slot: usize,
        filter_address: u16,
        filter_type: FilterType,
        function_address: u8,
    ) -> Result<(), FilterError> {
        self.filters
            .update(slot, filter_address, filter_type, function_address)
    }

    /// Route one frame
    ///
    /// Frames forwarded to a link target are passed to `send`.
    pub fn route(
        &mut self,
        frame: &CanMessage,
        send: &mut dyn FnMut(CanMessage),
    ) -> RoutingOutcome {
        let raw = match frame.id() {
            CanId::Std(raw) => raw,
            CanId::Extended(_) => return RoutingOutcome::Dropped(DropReason::InvalidAddress),
        };

        let decision = if raw == Service::Update.address() {
            Decision::Admit(0)
        } else {
            self.filters.decide(raw)
        };
        let Decision::Admit(function_address) = decision else {
            debug!("Frame for 0x{:x} filtered", raw);
            return RoutingOutcome::Dropped(DropReason::Filtered);
        };

        let registry = self.registry;
        let Ok(record) = registry.lookup(raw) else {
            debug!("No board owns 0x{:x}", raw);
            return RoutingOutcome::Dropped(DropReason::UnknownAddress);
        };
        let offset = (raw & OFFSET_MASK) as u8;

        if record.bus_address.raw() == SVR {
            return self.handle_service(offset, frame);
        }

        if record.board_type == BoardType::Undefined {
            debug!("Board {} is not installed", record.label);
            return RoutingOutcome::Dropped(DropReason::InactiveBoard);
        }

        let ctx = FrameContext {
            address: record.bus_address.with_offset(offset).unwrap_or(record.bus_address),
            label: record.label,
            offset,
            board_type: record.board_type,
            function_address,
        };
        let handler = record.handlers[offset as usize];
        let output = self.handlers.dispatch(handler, &ctx, frame);

        let forwarded_to = match (record.links[offset as usize], output) {
            (Some(target), Some(payload)) => {
                send(CanMessage::new(CanId::Std(target.raw()), &payload));
                Some(target)
            }
            _ => None,
        };
        RoutingOutcome::Delivered {
            handler,
            forwarded_to,
        }
    }

    fn handle_service(&mut self, offset: u8, frame: &CanMessage) -> RoutingOutcome {
        let Ok(service) = Service::try_from(offset) else {
            return RoutingOutcome::Dropped(DropReason::InvalidAddress);
        };

        match service {
            Service::Update => {
                let Ok(update) = FilterUpdate::try_from(frame.data()) else {
                    warn!("Malformed filter update");
                    return RoutingOutcome::Dropped(DropReason::MalformedService);
                };
                if self.filters.apply(&update).is_err() {
                    warn!("Filter slot {} is out of range", update.slot);
                    return RoutingOutcome::Dropped(DropReason::FilterSlotOutOfRange);
                }
                info!(
                    "Filter slot {} set to 0x{:x} type {} fct {}",
                    update.slot,
                    update.address,
                    update.filter_type as u8,
                    update.function_address
                );
            }
            Service::Bme | Service::AlarmBme => match SensorReport::try_from(frame.data()) {
                Ok(report) => {
                    if let Some(services) = self.services.as_mut() {
                        services.handle_sensor(service, report);
                    }
                }
                Err(_) => {
                    warn!("Malformed sensor report on 0x{:x}", service.address());
                    return RoutingOutcome::Dropped(DropReason::MalformedService);
                }
            },
            _ => (),
        }

        if let Some(services) = self.services.as_mut() {
            services.handle_service(service, frame);
        }
        RoutingOutcome::Service(service)
    }
}
