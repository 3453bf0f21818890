//! Tests for the FLIR Boson driver against mocked SDK and video capture.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use rstest::*;
use serde_json::json;

use amodevices::{DeviceConfig, InstrumentError};

use flir_boson::{
    BosonControl, FlirBoson, FlrResult, Frame, FrameGrabber, GainMode, UsbVideoIr16Mode,
    convert_frame_to_celsius,
};

#[derive(Default)]
struct MockState {
    calls: Vec<String>,
    fail_call: Option<(String, u32)>,
    grabber_fails: bool,
    frames: VecDeque<Option<Vec<u16>>>,
}

#[derive(Clone, Default)]
struct Mock {
    state: Arc<Mutex<MockState>>,
}

impl Mock {
    fn call(&self, call: String) -> FlrResult<()> {
        let mut state = self.state.lock().unwrap();
        let fail = match &state.fail_call {
            Some((name, code)) if call.starts_with(name.as_str()) => Some(*code),
            _ => None,
        };
        state.calls.push(call);
        match fail {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn fail_on(&self, name: &str, code: u32) {
        self.state.lock().unwrap().fail_call = Some((name.to_string(), code));
    }

    fn push_frame(&self, frame: Option<Vec<u16>>) {
        self.state.lock().unwrap().frames.push_back(frame);
    }
}

impl BosonControl for Mock {
    fn open_comm(&mut self, port: &str) -> FlrResult<()> {
        self.call(format!("open_comm {port}"))
    }

    fn close_comm(&mut self) -> FlrResult<()> {
        self.call("close_comm".to_string())
    }

    fn set_gain_mode(&mut self, mode: GainMode) -> FlrResult<()> {
        self.call(format!("set_gain_mode {mode:?}"))
    }

    fn tlinear_set_control(&mut self, enable: bool) -> FlrResult<()> {
        self.call(format!("tlinear_set_control {enable}"))
    }

    fn set_usb_video_ir16_mode(&mut self, mode: UsbVideoIr16Mode) -> FlrResult<()> {
        self.call(format!("set_usb_video_ir16_mode {mode:?}"))
    }

    fn set_emissivity_target(&mut self, percent: u16) -> FlrResult<()> {
        self.call(format!("set_emissivity_target {percent}"))
    }

    fn set_temp_window(&mut self, kelvin: u16) -> FlrResult<()> {
        self.call(format!("set_temp_window {kelvin}"))
    }

    fn set_transmission_window(&mut self, percent: u16) -> FlrResult<()> {
        self.call(format!("set_transmission_window {percent}"))
    }

    fn set_reflectivity_window(&mut self, percent: u16) -> FlrResult<()> {
        self.call(format!("set_reflectivity_window {percent}"))
    }

    fn set_temp_window_reflection(&mut self, kelvin: u16) -> FlrResult<()> {
        self.call(format!("set_temp_window_reflection {kelvin}"))
    }

    fn set_transmission_atmosphere(&mut self, percent: u16) -> FlrResult<()> {
        self.call(format!("set_transmission_atmosphere {percent}"))
    }

    fn set_temp_atmosphere(&mut self, kelvin: u16) -> FlrResult<()> {
        self.call(format!("set_temp_atmosphere {kelvin}"))
    }

    fn set_temp_background(&mut self, kelvin: u16) -> FlrResult<()> {
        self.call(format!("set_temp_background {kelvin}"))
    }

    fn tlinear_refresh_lut(&mut self, mode: GainMode) -> FlrResult<()> {
        self.call(format!("tlinear_refresh_lut {mode:?}"))
    }

    fn run_ffc(&mut self) -> FlrResult<()> {
        self.call("run_ffc".to_string())
    }
}

impl FrameGrabber for Mock {
    fn open(&mut self, device_index: u32) -> Result<(), InstrumentError> {
        if self.state.lock().unwrap().grabber_fails {
            return Err(InstrumentError::DeviceNotFound(format!(
                "No capture device {device_index}"
            )));
        }
        let _ = self.call(format!("grabber_open {device_index}"));
        Ok(())
    }

    fn set_resolution(&mut self, width: u32, height: u32) -> Result<(), InstrumentError> {
        let _ = self.call(format!("grabber_resolution {width}x{height}"));
        Ok(())
    }

    fn set_fourcc(&mut self, fourcc: [u8; 4]) -> Result<(), InstrumentError> {
        let _ = self.call(format!(
            "grabber_fourcc {}",
            String::from_utf8_lossy(&fourcc)
        ));
        Ok(())
    }

    fn set_convert_rgb(&mut self, convert: bool) -> Result<(), InstrumentError> {
        let _ = self.call(format!("grabber_convert_rgb {convert}"));
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Vec<u16>>, InstrumentError> {
        Ok(self.state.lock().unwrap().frames.pop_front().flatten())
    }

    fn release(&mut self) {
        let _ = self.call("grabber_release".to_string());
    }
}

type BosonMock = FlirBoson<Mock, Mock>;

#[fixture]
fn mock() -> Mock {
    Mock::default()
}

fn crt_inst(mock: &Mock, params: serde_json::Value) -> BosonMock {
    let config = DeviceConfig::new("Thermal camera", "COM7").with_device_specific(params);
    FlirBoson::from_config(mock.clone(), mock.clone(), &config).unwrap()
}

fn small_params() -> serde_json::Value {
    json!({"CV2Config": {"Resolution": [2, 2]}})
}

#[rstest]
fn test_connect_sequence(mock: Mock) {
    let cam = crt_inst(&mock, json!({}));
    cam.connect().unwrap();
    assert!(cam.is_connected());
    assert_eq!(
        mock.calls(),
        vec![
            "open_comm COM7",
            "set_gain_mode High",
            "tlinear_set_control true",
            "set_usb_video_ir16_mode TLinear",
            "set_emissivity_target 100",
            "set_temp_window 295",
            "set_transmission_window 100",
            "set_reflectivity_window 0",
            "set_temp_window_reflection 295",
            "set_transmission_atmosphere 100",
            "set_temp_atmosphere 295",
            "set_temp_background 295",
            "tlinear_refresh_lut High",
            "run_ffc",
            "grabber_open 1",
            "grabber_resolution 320x256",
            "grabber_fourcc Y16 ",
            "grabber_convert_rgb false",
        ]
    );
}

#[rstest]
fn test_connect_radiometry_from_config(mock: Mock) {
    let cam = crt_inst(
        &mock,
        json!({
            "Radiometry": {"EmissivityTarget": 95, "TempBackground": 300},
            "CV2Config": {"DeviceIndex": 0}
        }),
    );
    assert_eq!(cam.params().radiometry.temp_window, 295);
    cam.connect().unwrap();
    let calls = mock.calls();
    assert!(calls.contains(&"set_emissivity_target 95".to_string()));
    assert!(calls.contains(&"set_temp_background 300".to_string()));
    assert!(calls.contains(&"grabber_open 0".to_string()));
}

#[rstest]
fn test_connect_open_fails(mock: Mock) {
    mock.fail_on("open_comm", 0x0300);
    let cam = crt_inst(&mock, json!({}));
    assert!(matches!(
        cam.connect(),
        Err(InstrumentError::ConnectionFailed { .. })
    ));
    assert_eq!(mock.calls(), vec!["open_comm COM7"]);
}

#[rstest]
fn test_connect_sdk_error_closes(mock: Mock) {
    mock.fail_on("run_ffc", 0x0203);
    let cam = crt_inst(&mock, json!({}));
    assert!(matches!(
        cam.connect(),
        Err(InstrumentError::Vendor { code: 0x0203, .. })
    ));
    assert!(!cam.is_connected());
    assert_eq!(mock.calls().last().unwrap(), "close_comm");
    assert!(!mock.calls().iter().any(|c| c.starts_with("grabber_open")));
}

#[rstest]
fn test_connect_grabber_fails(mock: Mock) {
    mock.state.lock().unwrap().grabber_fails = true;
    let cam = crt_inst(&mock, json!({}));
    assert!(matches!(
        cam.connect(),
        Err(InstrumentError::DeviceNotFound(_))
    ));
    assert!(!cam.is_connected());
    let calls = mock.calls();
    assert_eq!(calls[calls.len() - 2..], ["grabber_release", "close_comm"]);
}

#[rstest]
fn test_close(mock: Mock) {
    let cam = crt_inst(&mock, json!({}));
    cam.connect().unwrap();
    cam.close().unwrap();
    assert!(!cam.is_connected());
    let calls = mock.calls();
    assert_eq!(calls[calls.len() - 2..], ["grabber_release", "close_comm"]);
}

#[rstest]
fn test_read_frame(mock: Mock) {
    let cam = crt_inst(&mock, small_params());
    cam.connect().unwrap();
    mock.push_frame(Some(vec![27315, 29815, 30315, 37315]));
    let frame = cam.read_frame().unwrap();
    assert_eq!((frame.width, frame.height), (2, 2));
    assert_eq!(frame.pixel(1, 0), Some(30315));
    let temp = frame.temperature(0, 1).unwrap();
    assert!((temp.as_celsius() - 25.0).abs() < 1e-9);
    let celsius = convert_frame_to_celsius(&frame);
    let exp = [0.0, 25.0, 30.0, 100.0];
    for (got, exp) in celsius.iter().zip(exp) {
        assert!((got - exp).abs() < 1e-9);
    }
}

#[rstest]
fn test_read_frame_none(mock: Mock) {
    let cam = crt_inst(&mock, small_params());
    cam.connect().unwrap();
    mock.push_frame(None);
    assert!(matches!(
        cam.read_frame(),
        Err(InstrumentError::Measurement(_))
    ));
}

#[rstest]
fn test_read_frame_size_mismatch(mock: Mock) {
    let cam = crt_inst(&mock, small_params());
    cam.connect().unwrap();
    mock.push_frame(Some(vec![0; 3]));
    assert!(matches!(
        cam.read_frame(),
        Err(InstrumentError::Measurement(_))
    ));
}

#[rstest]
fn test_not_connected(mock: Mock) {
    let cam = crt_inst(&mock, json!({}));
    assert!(matches!(
        cam.read_frame(),
        Err(InstrumentError::NotConnected(_))
    ));
    assert!(matches!(cam.run_ffc(), Err(InstrumentError::NotConnected(_))));
}

#[rstest]
fn test_invalid_params(mock: Mock) {
    let config = DeviceConfig::new("Thermal camera", "COM7")
        .with_device_specific(json!({"CV2Config": {"Resolution": [320]}}));
    assert!(matches!(
        FlirBoson::from_config(mock.clone(), mock, &config),
        Err(InstrumentError::InvalidArgument(_))
    ));
}

#[rstest]
fn test_convert_empty_frame() {
    let frame = Frame {
        width: 0,
        height: 0,
        data: vec![],
    };
    assert!(convert_frame_to_celsius(&frame).is_empty());
}
