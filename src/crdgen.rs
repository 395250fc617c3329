use agent_reconciler::types::Agent;
use kube::CustomResourceExt;

fn main() {
    print!("{}", serde_yaml::to_string(&Agent::crd()).unwrap())
}
