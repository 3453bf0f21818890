//! Test cases for the [`LoopbackInterfaceString`].

use rstest::*;

use amodevices::{InstrumentInterface, LoopbackInterfaceString};

/// Create a new loopback interface from string slices.
fn crt_lbk(host2inst: Vec<&str>, inst2host: Vec<&str>, term: &str) -> LoopbackInterfaceString {
    let host2inst = host2inst.into_iter().map(String::from).collect();
    let inst2host = inst2host.into_iter().map(String::from).collect();
    LoopbackInterfaceString::new(host2inst, inst2host, term)
}

/// Loopback interface that contains no commands.
#[fixture]
fn emp_lbk() -> LoopbackInterfaceString {
    crt_lbk(vec![], vec![], "\n")
}

#[rstest]
fn check_acknowledgment() {
    let mut lbk = crt_lbk(vec!["cmd1"], vec!["ACK"], "\n");
    lbk.sendcmd("cmd1").unwrap();
    lbk.check_acknowledgment("ACK").unwrap();
}

#[rstest]
fn check_acknowledgment_fail() {
    let mut lbk = crt_lbk(vec![], vec!["NACK"], "\n");
    assert!(lbk.check_acknowledgment("ACK").is_err());
}

#[rstest]
fn finalize_empty(mut emp_lbk: LoopbackInterfaceString) {
    emp_lbk.finalize();
}

#[rstest]
fn query_with_terminator() {
    let mut lbk = crt_lbk(vec!["#1RD"], vec!["*1 1.23E-6"], "\r");
    lbk.set_terminator("\r");
    assert_eq!(lbk.get_terminator(), "\r");
    assert_eq!(lbk.query("#1RD").unwrap(), "*1 1.23E-6");
}

#[rstest]
fn query_with_inst_terminator() {
    let mut lbk = crt_lbk(vec!["Tcold?"], vec!["4.021"], "\n").with_inst_terminator("\r\n");
    lbk.sendcmd("Tcold?").unwrap();
    lbk.set_terminator("\r\n");
    assert_eq!(lbk.read_until_terminator().unwrap(), "4.021");
}

#[rstest]
fn read_framing_from_script() {
    let mut lbk = crt_lbk(vec!["xvoltage?\n"], vec!["[ 12.3]\r>"], "");
    lbk.write("xvoltage?\n").unwrap();
    lbk.set_terminator("\r");
    assert_eq!(lbk.read_until_terminator().unwrap(), "[ 12.3]");
    assert_eq!(lbk.read_byte().unwrap(), b'>');
}

#[rstest]
#[should_panic(expected = "Expected command")]
fn unexpected_command() {
    let mut lbk = crt_lbk(vec!["*IDN?"], vec![], "\n");
    lbk.sendcmd("*IDX?").unwrap();
}

#[rstest]
#[should_panic(expected = "No more commands were expected from host")]
fn too_many_commands(mut emp_lbk: LoopbackInterfaceString) {
    emp_lbk.sendcmd("*RST").unwrap();
}

#[rstest]
#[should_panic(expected = "No more commands were expected from instrument")]
fn too_many_reads(mut emp_lbk: LoopbackInterfaceString) {
    let _ = emp_lbk.read_until_terminator();
}

#[rstest]
#[should_panic(expected = "Leftover expected commands found from host")]
fn leftover_host_commands() {
    let _lbk = crt_lbk(vec!["*IDN?"], vec![], "\n");
}

#[rstest]
#[should_panic(expected = "Leftover expected commands found from instrument")]
fn leftover_inst_commands() {
    let _lbk = crt_lbk(vec![], vec!["ACME"], "\n");
}

#[rstest]
#[should_panic(expected = "Leftover bytes")]
fn leftover_bytes() {
    let mut lbk = crt_lbk(vec![], vec!["12"], "\n");
    lbk.read_byte().unwrap();
}
