use std::time::Duration;

use amodevices::{DeviceConfig, VisaRsResourceManager};
use measurements::Frequency;
use tracing_subscriber::EnvFilter;

use siglent_ssa3000xplus::{Detector, Ssa3000xPlus, YUnit};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = DeviceConfig::new("Spectrum analyzer", "TCPIP0::192.168.1.50::INSTR")
        .with_timeout(Duration::from_secs(5));
    let mut rm = VisaRsResourceManager::new().expect("No VISA library found");
    let mut inst =
        Ssa3000xPlus::connect(&mut rm, &config).expect("Failed to connect to spectrum analyzer");

    let mut freq = inst.freq();
    freq.set_center(Frequency::from_hertz(80e6)).unwrap();
    freq.set_span(Frequency::from_hertz(1e6)).unwrap();
    inst.set_y_unit(YUnit::Dbm).unwrap();
    inst.set_continuous_measurement(false).unwrap();

    let mut trace = inst.trace(1).unwrap();
    trace.set_detector(Detector::Positive).unwrap();
    inst.sweep().unwrap();

    let x = freq.values().unwrap();
    let y = trace.data().unwrap();
    let (idx, peak) = y
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
    println!("Peak of {peak:.2} dBm at {:.6} MHz", x[idx].as_megahertz());

    inst.close();
}
