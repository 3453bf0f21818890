//! Interface to the Thorlabs Kinesis integrated stepper motor library.

/// The functions of the Kinesis C API (`Thorlabs.MotionControl.IntegratedStepperMotors`) that
/// are used by this driver.
///
/// Devices are addressed by their serial number. Functions that return an `i16` return the
/// status code of the library, where `0` means success. An implementation wraps the vendor
/// library, tests use a mock.
pub trait KinesisBackend {
    /// Build the list of connected Kinesis devices (`TLI_BuildDeviceList`).
    fn build_device_list(&mut self) -> i16;

    /// Comma-separated serial numbers of all devices with the given type id
    /// (`TLI_GetDeviceListByTypeExt`).
    fn device_list_by_type(&mut self, type_id: u32) -> String;

    /// Open the device (`ISC_Open`).
    fn open(&mut self, serial_no: &str) -> i16;

    /// Close the device (`ISC_Close`).
    fn close(&mut self, serial_no: &str) -> i16;

    /// Clear the message queue of the device (`ISC_ClearMessageQueue`).
    fn clear_message_queue(&mut self, serial_no: &str);

    /// Start the internal loop that polls position and status (`ISC_StartPolling`).
    fn start_polling(&mut self, serial_no: &str, interval_ms: u32) -> bool;

    /// Stop the internal polling loop (`ISC_StopPolling`).
    fn stop_polling(&mut self, serial_no: &str);

    /// Request the position from the device (`ISC_RequestPosition`).
    fn request_position(&mut self, serial_no: &str) -> i16;

    /// Last position received from the device, in device units (`ISC_GetPosition`).
    fn get_position(&mut self, serial_no: &str) -> i32;

    /// Request the status bits from the device (`ISC_RequestStatusBits`).
    fn request_status_bits(&mut self, serial_no: &str) -> i16;

    /// Last status word received from the device (`ISC_GetStatusBits`).
    fn get_status_bits(&mut self, serial_no: &str) -> u32;

    /// Move to an absolute position in device units (`ISC_MoveToPosition`).
    fn move_to_position(&mut self, serial_no: &str, position: i32) -> i16;

    /// Home the device (`ISC_Home`).
    fn home(&mut self, serial_no: &str) -> i16;

    /// Stop the current move with the velocity profile (`ISC_StopProfiled`).
    fn stop_profiled(&mut self, serial_no: &str) -> i16;
}
