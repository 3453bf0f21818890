use amodevices::DeviceConfig;
use tracing_subscriber::EnvFilter;

use kjlc_xcg::{PA_PER_TORR, Xcg};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = DeviceConfig::from_json(
        r#"{
            "Device": "XCG chamber gauge",
            "Address": "/dev/ttyACM0",
            "Timeout": 1.0,
            "DeviceSpecificParams": {"InternalAddress": 1},
            "Channels": {"P_chamber": {"Type": "Pressure"}}
        }"#,
    )
    .expect("Invalid configuration");

    let mut inst = Xcg::from_config(&config).expect("Failed to open controller");

    for (id, pressure) in inst.get_values().unwrap() {
        println!("{id}: {:.3e} Torr", pressure.as_pascals() / PA_PER_TORR);
    }

    inst.close();
}
