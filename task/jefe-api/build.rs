fn main() {
    idol::client::build_client_stub("../../idl/jefe.idol", "client_stub.rs").unwrap();
}
