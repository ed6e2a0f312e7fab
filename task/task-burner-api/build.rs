fn main() {
    idol::client::build_client_stub("../../idl/burner.idol", "client_stub.rs").unwrap();
}
