use amodevices::DeviceConfig;
use measurements::{Frequency, Voltage};
use tracing_subscriber::EnvFilter;

use redpitaya_rp_lockbox::{RpLockbox, Waveform};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = DeviceConfig::new("Lockbox", "192.168.1.100");
    let mut lockbox = RpLockbox::connect(&config).expect("Failed to connect to lockbox");

    // Modulation on output 1.
    let mut out1 = lockbox.get_output(1).unwrap();
    out1.set_generator_waveform(Waveform::Sine).unwrap();
    out1.set_generator_frequency(Frequency::from_hertz(10e3)).unwrap();
    out1.set_generator_amplitude(Voltage::from_volts(0.05)).unwrap();
    out1.set_output_state(true).unwrap();

    // Lock input 1 to output 2, with relock on AIN0.
    let mut pid = lockbox.get_pid(1, 2).unwrap();
    pid.set_int_reset_state(true).unwrap();
    pid.set_setpoint(Voltage::from_volts(0.0)).unwrap();
    pid.set_kp(10.0).unwrap();
    pid.set_ki(1e4).unwrap();
    pid.set_relock_input(0).unwrap();
    pid.set_relock_minimum(Voltage::from_volts(0.2)).unwrap();
    pid.set_relock_maximum(Voltage::from_volts(1.0)).unwrap();
    pid.set_relock_state(true).unwrap();
    pid.set_int_reset_state(false).unwrap();

    let mut out2 = lockbox.get_output(2).unwrap();
    println!(
        "Error signal: {} V, output: {} V",
        out2.get_fast_analog_input().unwrap().as_volts(),
        out2.get_fast_analog_output().unwrap().as_volts()
    );

    lockbox.save_config().unwrap();
    lockbox.close();
}
