fn main() {
    idol::client::build_client_stub("../../idl/scheduler.idol", "client_stub.rs").unwrap();
}
