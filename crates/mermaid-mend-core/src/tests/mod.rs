mod correct;
