use integration_tests::{installed_registry, sim_bus::SimBus};
use qif_common::{
    board::BusAddress,
    messages::{CanId, CanMessage, ClickValue, Service},
    traits::CanSender,
};
use qif_node::{
    ClickDetector, HandlerTable, Node, NodeMbox, RelayHandler, Router, ServiceHandler,
};

mod utils;
use utils::{ids, BusLogger};

use serial_test::serial;

static CONTROLLER_MBOX: NodeMbox = NodeMbox::new();

fn relay_table(relays: &mut [RelayHandler; 16]) -> HandlerTable<'_> {
    let mut table = HandlerTable::new();
    for (code, relay) in relays.iter_mut().enumerate() {
        table.register(code as u8, relay).ok();
    }
    table
}

#[serial]
#[test]
fn test_switch_lights_partner_led() {
    let registry = installed_registry();
    let mut relays = [RelayHandler; 16];
    let mut node = Node::new(
        &CONTROLLER_MBOX,
        Router::new(&registry, relay_table(&mut relays)),
    );
    let mut bus = SimBus::new(vec![&CONTROLLER_MBOX]);
    let _logger = BusLogger::new(bus.new_receiver());
    let mut observer = bus.new_receiver();
    let mut switch = bus.new_sender();

    switch
        .send(CanMessage::new(CanId::Std(0x020), &[1]))
        .unwrap();
    bus.process(&mut [&mut node], 0);

    let frames = observer.drain();
    assert_eq!(vec![0x020, 0x040], ids(&frames));
    assert_eq!(&[1], frames[1].data());

    // Board 4 answers on board 2, slot 4 goes to LED 6
    switch
        .send(CanMessage::new(CanId::Std(0x044), &[0]))
        .unwrap();
    bus.process(&mut [&mut node], 1);
    assert_eq!(vec![0x044, 0x026], ids(&observer.drain()));

    assert_eq!(2, node.rx_message_count());
    assert_eq!(2, node.tx_message_count());
}

#[serial]
#[test]
fn test_double_click_reaches_partner_led() {
    let registry = installed_registry();
    let mut relays = [RelayHandler; 16];
    let mut node = Node::new(
        &CONTROLLER_MBOX,
        Router::new(&registry, relay_table(&mut relays)),
    );
    let mut bus = SimBus::new(vec![&CONTROLLER_MBOX]);
    let _logger = BusLogger::new(bus.new_receiver());
    let mut observer = bus.new_receiver();
    let mut switch_board = bus.new_sender();

    // Button 2 of board 2, clicked twice
    let mut detector = ClickDetector::new();
    let levels = [(0b100, 5), (0, 10), (0b100, 5), (0, 40)];
    for (level, ticks) in levels {
        for _ in 0..ticks {
            detector.scan_to_bus(level, BusAddress::for_label(2), &mut |msg| {
                switch_board.send(msg).unwrap();
            });
        }
    }
    bus.process(&mut [&mut node], 0);

    let frames = observer.drain();
    assert_eq!(vec![0x022, 0x042], ids(&frames));
    assert_eq!(&[ClickValue::DoubleShort as u8], frames[1].data());
}

#[serial]
#[test]
fn test_low_power_board_reports_to_switch() {
    let registry = installed_registry();
    let mut relays = [RelayHandler; 16];
    let mut node = Node::new(
        &CONTROLLER_MBOX,
        Router::new(&registry, relay_table(&mut relays)),
    );
    let mut bus = SimBus::new(vec![&CONTROLLER_MBOX]);
    let _logger = BusLogger::new(bus.new_receiver());
    let mut observer = bus.new_receiver();
    let mut board = bus.new_sender();

    board
        .send(CanMessage::new(CanId::Std(0x01F), &[0x22, 0x33]))
        .unwrap();
    // Slot 3 of the same board has no link
    board
        .send(CanMessage::new(CanId::Std(0x013), &[0x44]))
        .unwrap();
    bus.process(&mut [&mut node], 0);

    let frames = observer.drain();
    assert_eq!(vec![0x01F, 0x013, 0x02F], ids(&frames));
    assert_eq!(&[0x22, 0x33], frames[2].data());
}

#[serial]
#[test]
fn test_quiet_boards_forward_nothing() {
    let registry = installed_registry();
    let mut relays = [RelayHandler; 16];
    let mut node = Node::new(
        &CONTROLLER_MBOX,
        Router::new(&registry, relay_table(&mut relays)),
    );
    let mut bus = SimBus::new(vec![&CONTROLLER_MBOX]);
    let _logger = BusLogger::new(bus.new_receiver());
    let mut observer = bus.new_receiver();
    let mut sender = bus.new_sender();

    // Spare board with no-op handlers
    sender
        .send(CanMessage::new(CanId::Std(0x310), &[1]))
        .unwrap();
    // Virtual board: linked, but its handlers produce nothing
    sender
        .send(CanMessage::new(CanId::Std(0x640), &[1]))
        .unwrap();
    // Undefined board
    sender
        .send(CanMessage::new(CanId::Std(0x030), &[1]))
        .unwrap();
    bus.process(&mut [&mut node], 0);

    assert_eq!(vec![0x310, 0x640, 0x030], ids(&observer.drain()));
    assert_eq!(3, node.rx_message_count());
    assert_eq!(0, node.tx_message_count());
}

#[derive(Default)]
struct ResetCounter {
    resets: usize,
}

impl ServiceHandler for ResetCounter {
    fn handle_service(&mut self, service: Service, _frame: &CanMessage) {
        if service == Service::Reset {
            self.resets += 1;
        }
    }
}

#[serial]
#[test]
fn test_service_broadcasts_reach_application() {
    let registry = installed_registry();
    let mut services = ResetCounter::default();
    let router = Router::new(&registry, HandlerTable::new()).with_service_handler(&mut services);
    let mut node = Node::new(&CONTROLLER_MBOX, router);
    let mut bus = SimBus::new(vec![&CONTROLLER_MBOX]);
    let _logger = BusLogger::new(bus.new_receiver());
    let mut sender = bus.new_sender();

    sender
        .send(CanMessage::new(Service::Reset.can_id(), &[]))
        .unwrap();
    sender
        .send(CanMessage::new(Service::Time.can_id(), &[0, 0, 0, 0]))
        .unwrap();
    bus.process(&mut [&mut node], 0);
    drop(node);

    assert_eq!(1, services.resets);
}
