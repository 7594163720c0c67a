mod pr_flow;
mod stub_api;
