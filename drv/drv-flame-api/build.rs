fn main() {
    idol::client::build_client_stub("../../idl/flame.idol", "client_stub.rs").unwrap();
}
