#![allow(dead_code)]
use integration_tests::sim_bus::SimBusReceiver;
use qif_common::{
    messages::{CanId, CanMessage, FilterUpdate, Heartbeat, SensorReport},
    traits::CanReceiver,
};

/// Prints every frame seen on the bus when dropped, to help debugging failed tests
pub struct BusLogger {
    rx: SimBusReceiver,
}

impl BusLogger {
    pub fn new(rx: SimBusReceiver) -> Self {
        Self { rx }
    }

    pub fn print(&mut self) {
        println!("Bus message history");
        println!("-------------------");
        while let Some(msg) = self.rx.try_recv() {
            match msg.id() {
                CanId::Std(0x002) => match FilterUpdate::try_from(msg.data()) {
                    Ok(update) => println!("{:?}", update),
                    Err(_) => println!("{:?}", msg),
                },
                CanId::Std(0x004) => match Heartbeat::try_from(msg) {
                    Ok(hb) => println!("{:?}", hb),
                    Err(_) => println!("{:?}", msg),
                },
                CanId::Std(0x003) | CanId::Std(0x00F) => {
                    match SensorReport::try_from(msg.data()) {
                        Ok(report) => println!("{:?}", report),
                        Err(_) => println!("{:?}", msg),
                    }
                }
                id => println!("{:03x} {:02x?}", id.raw(), msg.data()),
            }
        }
    }
}

impl Drop for BusLogger {
    fn drop(&mut self) {
        self.print();
    }
}

/// The identifiers of a list of frames
pub fn ids(frames: &[CanMessage]) -> Vec<u32> {
    frames.iter().map(|f| f.id().raw()).collect()
}
