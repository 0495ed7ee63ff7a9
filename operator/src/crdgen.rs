use kube::CustomResourceExt;

use iot_simulator_operator::consumer::SimulatorConsumer;
use iot_simulator_operator::producer::SimulatorProducer;
use iot_simulator_operator::simulator::Simulator;

fn main() {
    print!("{}", serde_yaml::to_string(&Simulator::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&SimulatorProducer::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&SimulatorConsumer::crd()).unwrap());
}
