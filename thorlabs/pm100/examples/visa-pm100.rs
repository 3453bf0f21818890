use std::{thread, time::Duration};

use amodevices::{DeviceConfig, VisaRsResourceManager};
use measurements::Length;
use tracing_subscriber::EnvFilter;

use thorlabs_pm100::{Pm100, PowerUnit};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = DeviceConfig::new("Power meter", "USB0::0x1313::0x8078::P0012345::INSTR")
        .with_timeout(Duration::from_secs(2));
    let mut rm = VisaRsResourceManager::new().expect("No VISA library found");
    let mut inst = Pm100::connect(&mut rm, &config).expect("Failed to connect to power meter");

    let info = inst.sensor().info().unwrap();
    println!("Sensor {} (serial number {})", info.name, info.serial_number);

    inst.set_wavelength(Length::from_nanometers(486.0)).unwrap();
    let mut power = inst.power();
    power.set_unit(PowerUnit::Watt).unwrap();
    power.set_auto_range(true).unwrap();

    for _ in 0..10 {
        println!("{:.3e} W", power.read_power().unwrap().as_watts());
        thread::sleep(Duration::from_millis(200));
    }

    inst.close();
}
