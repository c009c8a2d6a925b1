fn main() {
    repolens::app::startup::startup();
}
