fn main() {
    idol::client::build_client_stub("../../idl/faultlog.idol", "client_stub.rs").unwrap();
}
